//! Element index: per-region word lists and chunk maps, built lazily.
//!
//! Words are extracted once per region and document revision. The chunk
//! plan derived from them is memoized by the `max_chars` value it was built
//! with and recomputed on the next access after that value changes.

use crate::document::region::{ContainerRef, RegionId, RegionProvider, TextRun, Word};
use crate::error::{ReadalongError, Result};
use crate::speech::cache::ChunkCache;
use crate::speech::service::{ChunkPayload, SynthesisRequest};
use crate::text::chunker::{Chunk, chunk};
use crate::text::token::word_spans;
use std::collections::HashMap;
use std::sync::Arc;

/// Cached words and chunk plan for one region.
#[derive(Debug, Clone)]
pub struct ElementState {
    region: RegionId,
    revision: u64,
    words: Vec<Word>,
    max_chars: usize,
    chunks: Vec<Chunk>,
    word_to_chunk: Vec<usize>,
    word_offset_in_chunk: Vec<usize>,
    chunk_start: Vec<usize>,
}

impl ElementState {
    fn build(region: RegionId, runs: &[TextRun], revision: u64, max_chars: usize) -> Self {
        let words = runs
            .iter()
            .filter(|run| run.is_readable())
            .flat_map(|run| {
                word_spans(&run.text)
                    .into_iter()
                    .map(move |(start, end)| Word {
                        container: run.container,
                        start_offset: start,
                        end_offset: end,
                        text: run.text[start..end].to_string(),
                    })
            })
            .collect();

        let mut state = Self {
            region,
            revision,
            words,
            max_chars: 0,
            chunks: Vec::new(),
            word_to_chunk: Vec::new(),
            word_offset_in_chunk: Vec::new(),
            chunk_start: Vec::new(),
        };
        state.rechunk(max_chars);
        state
    }

    fn rechunk(&mut self, max_chars: usize) {
        let texts: Vec<&str> = self.words.iter().map(|w| w.text.as_str()).collect();
        self.chunks = chunk(&texts, max_chars);
        self.max_chars = max_chars;

        self.word_to_chunk.clear();
        self.word_offset_in_chunk.clear();
        self.chunk_start.clear();
        let mut start = 0;
        for (chunk_index, c) in self.chunks.iter().enumerate() {
            self.chunk_start.push(start);
            for offset in 0..c.word_count {
                self.word_to_chunk.push(chunk_index);
                self.word_offset_in_chunk.push(offset);
            }
            start += c.word_count;
        }
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, chunk_index: usize) -> Option<&Chunk> {
        self.chunks.get(chunk_index)
    }

    /// Chunk containing the word.
    pub fn chunk_of(&self, word_index: usize) -> Option<usize> {
        self.word_to_chunk.get(word_index).copied()
    }

    /// Position of the word inside its chunk.
    pub fn offset_in_chunk(&self, word_index: usize) -> Option<usize> {
        self.word_offset_in_chunk.get(word_index).copied()
    }

    /// Index of the chunk's first word in the region.
    pub fn chunk_start(&self, chunk_index: usize) -> Option<usize> {
        self.chunk_start.get(chunk_index).copied()
    }

    /// The words a chunk consumes.
    pub fn chunk_words(&self, chunk_index: usize) -> &[Word] {
        match (self.chunk_start(chunk_index), self.chunk(chunk_index)) {
            (Some(start), Some(c)) => &self.words[start..start + c.word_count],
            _ => &[],
        }
    }

    /// Word at or after `offset` in `container`.
    ///
    /// A point inside a word resolves to that word; a point in whitespace to
    /// the next word of the same container.
    pub fn word_at(&self, container: ContainerRef, offset: usize) -> Option<usize> {
        self.words
            .iter()
            .position(|w| w.container == container && offset < w.end_offset)
    }
}

/// Per-session cache of element states and synthesized chunks.
#[derive(Debug, Default)]
pub struct ElementIndex {
    states: HashMap<RegionId, ElementState>,
    chunks: ChunkCache,
}

impl ElementIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the region's state, building or re-chunking it as needed.
    pub fn ensure_state(
        &mut self,
        provider: &dyn RegionProvider,
        region: RegionId,
        max_chars: usize,
    ) -> Result<&ElementState> {
        let revision = provider.revision();
        let stale = self
            .states
            .get(&region)
            .is_none_or(|state| state.revision != revision);

        if stale {
            let runs = provider.text_runs(region)?;
            let state = ElementState::build(region, &runs, revision, max_chars);
            tracing::debug!(
                %region,
                words = state.word_count(),
                chunks = state.chunks.len(),
                revision,
                "indexed region"
            );
            self.states.insert(region, state);
        }

        let state = self
            .states
            .get_mut(&region)
            .ok_or(ReadalongError::UnknownRegion { region: region.0 })?;
        if state.max_chars != max_chars {
            tracing::debug!(%region, from = state.max_chars, to = max_chars, "re-chunking region");
            state.rechunk(max_chars);
        }
        Ok(state)
    }

    /// Previously built state, without touching the provider.
    pub fn state(&self, region: RegionId) -> Option<&ElementState> {
        self.states.get(&region)
    }

    pub fn invalidate(&mut self, region: RegionId) {
        self.states.remove(&region);
    }

    pub fn cached_chunk(&mut self, key: &SynthesisRequest) -> Option<Arc<ChunkPayload>> {
        let hit = self.chunks.get(key);
        if hit.is_some() {
            tracing::debug!(chars = key.text.len(), "chunk cache hit");
        }
        hit
    }

    pub fn insert_chunk(&mut self, key: SynthesisRequest, payload: Arc<ChunkPayload>) {
        self.chunks.insert(key, payload);
    }

    pub fn chunk_cache(&self) -> &ChunkCache {
        &self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::region::{RootId, RunKind};
    use crate::document::static_doc::StaticDocument;
    use crate::speech::service::SynthesizedAudio;

    fn doc(text: &str) -> (StaticDocument, RegionId) {
        let doc = StaticDocument::new();
        let id = doc.add_region(RootId(0), text);
        (doc, id)
    }

    #[test]
    fn test_words_carry_offsets() {
        let (doc, id) = doc("Hello  brave world.");
        let mut index = ElementIndex::new();
        let state = index.ensure_state(&doc, id, 100).unwrap();

        let words = state.words();
        assert_eq!(words.len(), 3);
        assert_eq!(words[1].text, "brave");
        assert_eq!((words[1].start_offset, words[1].end_offset), (7, 12));
        assert_eq!(words[2].text, "world.");
    }

    #[test]
    fn test_skips_unreadable_runs() {
        let (doc, id) = doc("seen words");
        doc.add_run(id, "hidden words", RunKind::Hidden).unwrap();
        doc.add_run(id, "typed words", RunKind::Editable).unwrap();
        doc.add_run(id, "more", RunKind::Readable).unwrap();

        let mut index = ElementIndex::new();
        let state = index.ensure_state(&doc, id, 100).unwrap();
        let texts: Vec<&str> = state.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["seen", "words", "more"]);
    }

    #[test]
    fn test_chunk_maps() {
        let (doc, id) = doc(
            "The first sentence is here. The second sentence follows it. \
             A third one closes the paragraph.",
        );
        let mut index = ElementIndex::new();
        let state = index.ensure_state(&doc, id, 30).unwrap();

        assert!(state.chunks().len() > 1);
        let total: usize = state.chunks().iter().map(|c| c.word_count).sum();
        assert_eq!(total, state.word_count());

        for word in 0..state.word_count() {
            let c = state.chunk_of(word).unwrap();
            let offset = state.offset_in_chunk(word).unwrap();
            assert_eq!(state.chunk_start(c).unwrap() + offset, word);
            assert_eq!(state.chunk_words(c)[offset], state.words()[word]);
        }
        assert!(state.chunk_of(state.word_count()).is_none());
    }

    #[test]
    fn test_rechunks_when_max_chars_changes() {
        let (doc, id) = doc("aaaa bbbb cccc dddd eeee ffff gggg hhhh iiii jjjj");
        let mut index = ElementIndex::new();

        let wide = index.ensure_state(&doc, id, 200).unwrap().chunks().len();
        let narrow_state = index.ensure_state(&doc, id, 10).unwrap();
        assert_eq!(narrow_state.max_chars(), 10);
        assert!(narrow_state.chunks().len() > wide);
        assert_eq!(wide, 1);
    }

    #[test]
    fn test_rebuilds_on_revision_change() {
        let (doc, id) = doc("old text");
        let mut index = ElementIndex::new();
        assert_eq!(index.ensure_state(&doc, id, 100).unwrap().word_count(), 2);

        doc.set_text(id, "brand new text here").unwrap();
        assert_eq!(index.ensure_state(&doc, id, 100).unwrap().word_count(), 4);
    }

    #[test]
    fn test_empty_region() {
        let (doc, id) = doc("   ");
        let mut index = ElementIndex::new();
        let state = index.ensure_state(&doc, id, 100).unwrap();
        assert!(state.is_empty());
        assert!(state.chunks().is_empty());
        assert!(state.chunk_words(0).is_empty());
    }

    #[test]
    fn test_unknown_region_propagates() {
        let doc = StaticDocument::new();
        let mut index = ElementIndex::new();
        assert!(index.ensure_state(&doc, RegionId(5), 100).is_err());
    }

    #[test]
    fn test_word_at_offset() {
        let (doc, id) = doc("one two three");
        let container = doc.first_container(id).unwrap();
        let mut index = ElementIndex::new();
        let state = index.ensure_state(&doc, id, 100).unwrap();

        assert_eq!(state.word_at(container, 0), Some(0));
        assert_eq!(state.word_at(container, 5), Some(1));
        // Whitespace resolves forward.
        assert_eq!(state.word_at(container, 3), Some(1));
        assert_eq!(state.word_at(container, 40), None);
        assert_eq!(state.word_at(ContainerRef(999), 0), None);
    }

    #[test]
    fn test_chunk_cache_roundtrip() {
        let mut index = ElementIndex::new();
        let key = SynthesisRequest {
            text: "hello".to_string(),
            model: "m".to_string(),
            voice: "v".to_string(),
        };
        assert!(index.cached_chunk(&key).is_none());

        index.insert_chunk(
            key.clone(),
            Arc::new(ChunkPayload {
                audio: SynthesizedAudio {
                    bytes: vec![1, 2],
                    mime_type: "audio/mpeg".to_string(),
                },
                transcript: Vec::new(),
            }),
        );
        assert!(index.cached_chunk(&key).is_some());
        assert_eq!(index.chunk_cache().stats(), (1, 1));
    }
}
