//! Command-line interface for readalong
//!
//! Provides argument parsing using clap derive macros.

use crate::config::ReadingMode;
use crate::document::region::Direction;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Read text aloud with word-level highlighting
#[derive(Parser, Debug)]
#[command(name = "readalong", version, about = "Word-level read-along synchronization")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Maximum characters per synthesis chunk (overrides config)
    #[arg(long, global = true, value_name = "N")]
    pub max_chars: Option<usize>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the chunk plan for a text
    Chunks {
        /// Text file to read (default: stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run a read-along session against simulated speech and audio
    Simulate {
        /// Text file to read; paragraphs are separated by blank lines (default: stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Reading mode
        #[arg(long, value_enum, default_value = "linear")]
        mode: ModeArg,

        /// Spoken duration of each simulated word. Examples: 200ms, 0.5s
        #[arg(long, value_name = "DURATION", default_value = "200ms", value_parser = parse_duration)]
        word_time: Duration,

        /// Simulated synthesis latency per chunk
        #[arg(long, value_name = "DURATION", default_value = "0s", value_parser = parse_duration)]
        latency: Duration,

        /// Roam steps to send after `--after`, e.g. "fffb" (f = forward, b = backward)
        #[arg(long, value_name = "STEPS", value_parser = parse_steps)]
        steps: Option<Steps>,

        /// Delay before sending roam steps
        #[arg(long, value_name = "DURATION", default_value = "1s", value_parser = parse_duration)]
        after: Duration,

        /// Roam debounce override
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        debounce: Option<Duration>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Linear,
    WordByWord,
}

impl From<ModeArg> for ReadingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Linear => ReadingMode::Linear,
            ModeArg::WordByWord => ReadingMode::WordByWord,
        }
    }
}

/// Roam steps given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Steps(pub Vec<Direction>);

/// Parse a duration string.
///
/// Supports any format accepted by `humantime` (`300ms`, `2s`, `1m30s`) plus
/// bare numbers, taken as seconds and allowed to be fractional.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|e| e.to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Parse a step string: `f`/`>` forward, `b`/`<` backward.
fn parse_steps(s: &str) -> Result<Steps, String> {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .map(|c| match c {
            'f' | 'F' | '>' => Ok(Direction::Forward),
            'b' | 'B' | '<' => Ok(Direction::Backward),
            other => Err(format!("unknown step '{}', use f or b", other)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chunks_defaults() {
        let cli = Cli::try_parse_from(["readalong", "chunks"]).unwrap();
        match cli.command {
            Commands::Chunks { input, json } => {
                assert!(input.is_none());
                assert!(!json);
            }
            _ => panic!("Expected Chunks command"),
        }
        assert!(cli.max_chars.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "readalong",
            "chunks",
            "--max-chars",
            "120",
            "-vv",
            "--config",
            "/path/to/config.toml",
        ])
        .unwrap();
        assert_eq!(cli.max_chars, Some(120));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
    }

    #[test]
    fn test_parse_simulate_defaults() {
        let cli = Cli::try_parse_from(["readalong", "simulate", "text.txt"]).unwrap();
        match cli.command {
            Commands::Simulate {
                input,
                mode,
                word_time,
                latency,
                steps,
                after,
                debounce,
            } => {
                assert_eq!(input, Some(PathBuf::from("text.txt")));
                assert_eq!(mode, ModeArg::Linear);
                assert_eq!(word_time, Duration::from_millis(200));
                assert_eq!(latency, Duration::ZERO);
                assert!(steps.is_none());
                assert_eq!(after, Duration::from_secs(1));
                assert!(debounce.is_none());
            }
            _ => panic!("Expected Simulate command"),
        }
    }

    #[test]
    fn test_parse_simulate_roaming() {
        let cli = Cli::try_parse_from([
            "readalong",
            "simulate",
            "--mode",
            "word-by-word",
            "--steps",
            "ff,b",
            "--debounce",
            "150ms",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate {
                mode,
                steps,
                debounce,
                ..
            } => {
                assert_eq!(mode, ModeArg::WordByWord);
                assert_eq!(
                    steps,
                    Some(Steps(vec![
                        Direction::Forward,
                        Direction::Forward,
                        Direction::Backward
                    ]))
                );
                assert_eq!(debounce, Some(Duration::from_millis(150)));
            }
            _ => panic!("Expected Simulate command"),
        }
    }

    #[test]
    fn test_parse_duration_formats() {
        assert_eq!(parse_duration("0.5").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-1").is_err());
    }

    #[test]
    fn test_parse_steps_rejects_unknown() {
        assert!(parse_steps("fx").is_err());
        assert_eq!(
            parse_steps("<>").unwrap(),
            Steps(vec![Direction::Backward, Direction::Forward])
        );
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["readalong", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["readalong"]).is_err());
    }

    #[test]
    fn test_mode_into_reading_mode() {
        assert_eq!(ReadingMode::from(ModeArg::WordByWord), ReadingMode::WordByWord);
    }
}
