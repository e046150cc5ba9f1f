use crate::error::{ReadalongError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One transcribed word with timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl TranscriptWord {
    pub fn new(text: &str, start: f64, end: f64) -> Self {
        Self {
            text: text.to_string(),
            start,
            end,
        }
    }
}

/// Encoded audio returned by synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Text plus the voice it should be spoken in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SynthesisRequest {
    pub text: String,
    pub model: String,
    pub voice: String,
}

/// Synthesized audio paired with its (possibly empty) transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPayload {
    pub audio: SynthesizedAudio,
    pub transcript: Vec<TranscriptWord>,
}

/// Remote text-to-speech and speech-to-text collaborator.
///
/// Implementations own transport, retry and backoff; the core treats every
/// error as terminal for the chunk it was requested for.
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Turn text into encoded audio.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio>;

    /// Produce word-level timestamps for previously synthesized audio.
    async fn transcribe(
        &self,
        audio: &SynthesizedAudio,
        language: Option<&str>,
    ) -> Result<Vec<TranscriptWord>>;
}

/// Implement SpeechService for Arc<T> to allow sharing across sessions.
#[async_trait]
impl<T: SpeechService + ?Sized> SpeechService for Arc<T> {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        (**self).synthesize(request).await
    }

    async fn transcribe(
        &self,
        audio: &SynthesizedAudio,
        language: Option<&str>,
    ) -> Result<Vec<TranscriptWord>> {
        (**self).transcribe(audio, language).await
    }
}

/// Synthesize one chunk and transcribe the result.
///
/// A failed transcription degrades to an empty transcript; the timing
/// normalizer falls back to uniform timing for it.
pub async fn synthesize_chunk(
    service: &dyn SpeechService,
    request: &SynthesisRequest,
    language: Option<&str>,
) -> Result<ChunkPayload> {
    let audio = service.synthesize(request).await?;
    let transcript = match service.transcribe(&audio, language).await {
        Ok(words) => words,
        Err(e) => {
            tracing::warn!(error = %e, "transcription unavailable, using uniform timing");
            Vec::new()
        }
    };
    Ok(ChunkPayload { audio, transcript })
}

/// Audio bytes per second produced by [`MockSpeechService`].
pub const MOCK_BYTES_PER_SEC: usize = 1000;

/// Mime type used by [`MockSpeechService`].
pub const MOCK_MIME: &str = "audio/x-readalong-mock";

/// What the mock returns from `transcribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockTranscript {
    /// One timestamped word per spoken word.
    Exact,
    /// An empty word list.
    Empty,
    /// A transcription error.
    Fail,
}

#[derive(Debug, Default)]
struct MockLog {
    synthesized: Vec<String>,
    transcribed: usize,
}

/// Mock speech service for testing
///
/// Audio is `word_secs` per word at [`MOCK_BYTES_PER_SEC`]; the audio bytes
/// carry the text so `transcribe` can reproduce its words.
#[derive(Debug, Clone)]
pub struct MockSpeechService {
    word_secs: f64,
    delay: Duration,
    slow: Vec<(String, Duration)>,
    failing: Vec<String>,
    transcript: MockTranscript,
    log: Arc<Mutex<MockLog>>,
}

impl MockSpeechService {
    /// Create a mock that answers immediately with exact transcripts.
    pub fn new() -> Self {
        Self {
            word_secs: 0.5,
            delay: Duration::ZERO,
            slow: Vec::new(),
            failing: Vec::new(),
            transcript: MockTranscript::Exact,
            log: Arc::new(Mutex::new(MockLog::default())),
        }
    }

    /// Spoken duration of each word.
    pub fn with_word_secs(mut self, secs: f64) -> Self {
        self.word_secs = secs;
        self
    }

    /// Delay every synthesis call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay synthesis of texts containing `needle` (overrides `with_delay`).
    pub fn with_slow_text(mut self, needle: &str, delay: Duration) -> Self {
        self.slow.push((needle.to_string(), delay));
        self
    }

    /// Fail synthesis of texts containing `needle`.
    pub fn with_failure_on(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }

    /// Configure transcription behavior.
    pub fn with_transcript(mut self, transcript: MockTranscript) -> Self {
        self.transcript = transcript;
        self
    }

    /// Texts passed to `synthesize`, in call order.
    pub fn synthesized_texts(&self) -> Vec<String> {
        self.log
            .lock()
            .map(|log| log.synthesized.clone())
            .unwrap_or_default()
    }

    /// Number of `synthesize` calls so far.
    pub fn synthesis_count(&self) -> usize {
        self.log.lock().map(|log| log.synthesized.len()).unwrap_or(0)
    }

    /// Number of `transcribe` calls so far.
    pub fn transcription_count(&self) -> usize {
        self.log.lock().map(|log| log.transcribed).unwrap_or(0)
    }

    fn delay_for(&self, text: &str) -> Duration {
        self.slow
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, delay)| *delay)
            .unwrap_or(self.delay)
    }
}

impl Default for MockSpeechService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechService for MockSpeechService {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        if let Ok(mut log) = self.log.lock() {
            log.synthesized.push(request.text.clone());
        }

        let delay = self.delay_for(&request.text);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self
            .failing
            .iter()
            .any(|needle| request.text.contains(needle.as_str()))
        {
            return Err(ReadalongError::Other(format!(
                "mock synthesis failure for {:?}",
                request.text
            )));
        }

        let word_count = request.text.split_whitespace().count();
        let total_bytes = (word_count as f64 * self.word_secs * MOCK_BYTES_PER_SEC as f64) as usize;
        let mut bytes = request.text.as_bytes().to_vec();
        bytes.resize(total_bytes.max(bytes.len()), 0);

        Ok(SynthesizedAudio {
            bytes,
            mime_type: MOCK_MIME.to_string(),
        })
    }

    async fn transcribe(
        &self,
        audio: &SynthesizedAudio,
        _language: Option<&str>,
    ) -> Result<Vec<TranscriptWord>> {
        if let Ok(mut log) = self.log.lock() {
            log.transcribed += 1;
        }

        match self.transcript {
            MockTranscript::Fail => Err(ReadalongError::Transcription {
                message: "mock transcription failure".to_string(),
            }),
            MockTranscript::Empty => Ok(Vec::new()),
            MockTranscript::Exact => {
                let text_end = audio
                    .bytes
                    .iter()
                    .position(|&b| b == 0)
                    .unwrap_or(audio.bytes.len());
                let text = String::from_utf8_lossy(&audio.bytes[..text_end]);
                Ok(text
                    .split_whitespace()
                    .enumerate()
                    .map(|(i, word)| {
                        let start = i as f64 * self.word_secs;
                        TranscriptWord::new(word, start, start + self.word_secs * 0.9)
                    })
                    .collect())
            }
        }
    }
}
