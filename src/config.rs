use crate::defaults;
use crate::error::{ReadalongError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub speech: SpeechConfig,
    pub roam: RoamConfig,
    pub playback: PlaybackConfig,
    pub behavior: BehaviorConfig,
}

/// Chunk sizing for synthesis requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
}

/// Remote speech service selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub model: String,
    pub voice: String,
    /// Hint passed to transcription; `None` lets the service detect.
    pub language: Option<String>,
}

/// Word-by-word navigation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoamConfig {
    pub debounce_ms: u64,
}

/// Playback loop tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub tick_ms: u64,
    pub linear_prefetch: usize,
}

/// Behavioral toggles read by the session controller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BehaviorConfig {
    pub auto_activate_on_selection: bool,
    pub reading_mode: ReadingMode,
}

/// How an activation starts reading
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadingMode {
    /// Read the region chunk by chunk from the start word.
    #[default]
    Linear,
    /// Land on the start word and wait for directional input.
    WordByWord,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: defaults::MAX_CHARS,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            voice: defaults::DEFAULT_VOICE.to_string(),
            language: None,
        }
    }
}

impl Default for RoamConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::ROAM_DEBOUNCE_MS,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_ms: defaults::TICK_MS,
            linear_prefetch: defaults::LINEAR_PREFETCH,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            auto_activate_on_selection: true,
            reading_mode: ReadingMode::Linear,
        }
    }
}

/// Immutable snapshot of the settings the core reads.
///
/// The host refreshes it through `SessionHandle::update_settings`; the core
/// never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub max_chars: usize,
    pub model: String,
    pub voice: String,
    pub language: Option<String>,
    pub debounce: Duration,
    pub tick: Duration,
    pub linear_prefetch: usize,
    pub auto_activate_on_selection: bool,
    pub reading_mode: ReadingMode,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReadalongError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ReadalongError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML and out-of-range values are still reported.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ReadalongError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - READALONG_MAX_CHARS → chunking.max_chars
    /// - READALONG_MODEL → speech.model
    /// - READALONG_VOICE → speech.voice
    /// - READALONG_LANGUAGE → speech.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(max_chars) = std::env::var("READALONG_MAX_CHARS")
            && let Ok(parsed) = max_chars.trim().parse::<usize>()
        {
            self.chunking.max_chars = parsed;
        }

        if let Ok(model) = std::env::var("READALONG_MODEL")
            && !model.is_empty()
        {
            self.speech.model = model;
        }

        if let Ok(voice) = std::env::var("READALONG_VOICE")
            && !voice.is_empty()
        {
            self.speech.voice = voice;
        }

        if let Ok(language) = std::env::var("READALONG_LANGUAGE")
            && !language.is_empty()
        {
            self.speech.language = Some(language);
        }

        self
    }

    /// Check value ranges the core relies on.
    pub fn validate(&self) -> Result<()> {
        let max_chars = self.chunking.max_chars;
        if !(defaults::MIN_MAX_CHARS..=defaults::MAX_MAX_CHARS).contains(&max_chars) {
            return Err(ReadalongError::ConfigInvalidValue {
                key: "chunking.max_chars".to_string(),
                message: format!(
                    "{} is outside {}..={}",
                    max_chars,
                    defaults::MIN_MAX_CHARS,
                    defaults::MAX_MAX_CHARS
                ),
            });
        }
        if self.roam.debounce_ms == 0 {
            return Err(ReadalongError::ConfigInvalidValue {
                key: "roam.debounce_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.playback.tick_ms == 0 {
            return Err(ReadalongError::ConfigInvalidValue {
                key: "playback.tick_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.playback.linear_prefetch == 0 {
            return Err(ReadalongError::ConfigInvalidValue {
                key: "playback.linear_prefetch".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Snapshot the values the session controller reads.
    pub fn settings(&self) -> Settings {
        Settings {
            max_chars: self
                .chunking
                .max_chars
                .clamp(defaults::MIN_MAX_CHARS, defaults::MAX_MAX_CHARS),
            model: self.speech.model.clone(),
            voice: self.speech.voice.clone(),
            language: self.speech.language.clone(),
            debounce: Duration::from_millis(self.roam.debounce_ms.max(1)),
            tick: Duration::from_millis(self.playback.tick_ms.max(1)),
            linear_prefetch: self.playback.linear_prefetch.max(1),
            auto_activate_on_selection: self.behavior.auto_activate_on_selection,
            reading_mode: self.behavior.reading_mode,
        }
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/readalong/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("readalong").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_readalong_env() {
        remove_env("READALONG_MAX_CHARS");
        remove_env("READALONG_MODEL");
        remove_env("READALONG_VOICE");
        remove_env("READALONG_LANGUAGE");
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.chunking.max_chars, 300);
        assert_eq!(config.speech.model, "tts-1");
        assert_eq!(config.speech.voice, "alloy");
        assert_eq!(config.speech.language, None);
        assert_eq!(config.roam.debounce_ms, 300);
        assert_eq!(config.playback.tick_ms, 16);
        assert_eq!(config.playback.linear_prefetch, 3);
        assert!(config.behavior.auto_activate_on_selection);
        assert_eq!(config.behavior.reading_mode, ReadingMode::Linear);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_config(
            r#"
            [chunking]
            max_chars = 120

            [speech]
            model = "tts-1-hd"
            voice = "nova"
            language = "de"

            [roam]
            debounce_ms = 250

            [playback]
            tick_ms = 33
            linear_prefetch = 2

            [behavior]
            auto_activate_on_selection = false
            reading_mode = "word_by_word"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.chunking.max_chars, 120);
        assert_eq!(config.speech.model, "tts-1-hd");
        assert_eq!(config.speech.voice, "nova");
        assert_eq!(config.speech.language.as_deref(), Some("de"));
        assert_eq!(config.roam.debounce_ms, 250);
        assert_eq!(config.playback.tick_ms, 33);
        assert_eq!(config.playback.linear_prefetch, 2);
        assert!(!config.behavior.auto_activate_on_selection);
        assert_eq!(config.behavior.reading_mode, ReadingMode::WordByWord);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_config(
            r#"
            [speech]
            voice = "echo"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.speech.voice, "echo");
        assert_eq!(config.speech.model, "tts-1");
        assert_eq!(config.chunking.max_chars, 300);
        assert_eq!(config.roam.debounce_ms, 300);
    }

    #[test]
    fn test_load_rejects_out_of_range_max_chars() {
        let temp_file = write_config("[chunking]\nmax_chars = 10\n");

        match Config::load(temp_file.path()) {
            Err(ReadalongError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "chunking.max_chars");
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_config(
            r#"
            [chunking
            max_chars = "broken
        "#,
        );

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(ReadalongError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_readalong_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_reports_invalid_toml() {
        let temp_file = write_config("[chunking\n");
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_readalong_env();

        set_env("READALONG_MAX_CHARS", "500");
        set_env("READALONG_MODEL", "tts-1-hd");
        set_env("READALONG_VOICE", "shimmer");
        set_env("READALONG_LANGUAGE", "fr");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.chunking.max_chars, 500);
        assert_eq!(config.speech.model, "tts-1-hd");
        assert_eq!(config.speech.voice, "shimmer");
        assert_eq!(config.speech.language.as_deref(), Some("fr"));

        clear_readalong_env();
    }

    #[test]
    fn test_env_override_empty_or_invalid_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_readalong_env();

        set_env("READALONG_MODEL", "");
        set_env("READALONG_MAX_CHARS", "lots");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.speech.model, "tts-1");
        assert_eq!(config.chunking.max_chars, 300);

        clear_readalong_env();
    }

    #[test]
    fn test_settings_snapshot_clamps_and_converts() {
        let mut config = Config::default();
        config.chunking.max_chars = 5000;
        config.roam.debounce_ms = 120;
        config.behavior.reading_mode = ReadingMode::WordByWord;

        let settings = config.settings();

        assert_eq!(settings.max_chars, 1000);
        assert_eq!(settings.debounce, Duration::from_millis(120));
        assert_eq!(settings.tick, Duration::from_millis(16));
        assert_eq!(settings.reading_mode, ReadingMode::WordByWord);
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        if let Some(path) = Config::default_path() {
            let path_str = path.to_string_lossy();
            assert!(path_str.contains("readalong"));
            assert!(path_str.ends_with("config.toml"));
        }
    }
}
