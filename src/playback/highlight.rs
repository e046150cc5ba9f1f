use crate::document::region::Word;
use std::sync::{Arc, Mutex};

/// Pluggable highlight output.
/// The scheduler calls `highlight` when the active word changes and `clear` on stop.
pub trait HighlightSink: Send + 'static {
    /// Mark `word` as the one currently being spoken.
    fn highlight(&mut self, word: &Word);

    /// Remove any highlight.
    fn clear(&mut self);

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "highlight"
    }
}

/// One call received by a [`CollectorHighlightSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightEvent {
    Word(Word),
    Clear,
}

/// Sink that records every call, for tests and the CLI's summary.
///
/// Clones share the same log, so a test can keep one while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct CollectorHighlightSink {
    events: Arc<Mutex<Vec<HighlightEvent>>>,
}

impl CollectorHighlightSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HighlightEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Texts of highlighted words, in order, ignoring clears.
    pub fn words(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HighlightEvent::Word(word) => Some(word.text),
                HighlightEvent::Clear => None,
            })
            .collect()
    }

    /// The word currently shown, if any.
    pub fn current(&self) -> Option<Word> {
        match self.events().pop() {
            Some(HighlightEvent::Word(word)) => Some(word),
            _ => None,
        }
    }

    fn push(&self, event: HighlightEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl HighlightSink for CollectorHighlightSink {
    fn highlight(&mut self, word: &Word) {
        self.push(HighlightEvent::Word(word.clone()));
    }

    fn clear(&mut self) {
        self.push(HighlightEvent::Clear);
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}
