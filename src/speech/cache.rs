//! Session-scoped cache of synthesized chunks.
//!
//! Keyed by the full synthesis request (text, model and voice), so a voice
//! change never serves stale audio.

use crate::speech::service::{ChunkPayload, SynthesisRequest};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ChunkCache {
    entries: HashMap<SynthesisRequest, Arc<ChunkPayload>>,
    hits: u64,
    misses: u64,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached payload for `request`, if any.
    pub fn get(&mut self, request: &SynthesisRequest) -> Option<Arc<ChunkPayload>> {
        match self.entries.get(request) {
            Some(payload) => {
                self.hits += 1;
                Some(Arc::clone(payload))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a payload, replacing any previous one for the same request.
    pub fn insert(&mut self, request: SynthesisRequest, payload: Arc<ChunkPayload>) {
        self.entries.insert(request, payload);
    }

    pub fn contains(&self, request: &SynthesisRequest) -> bool {
        self.entries.contains_key(request)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
