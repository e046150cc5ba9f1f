//! In-memory region provider.
//!
//! Holds a flat, document-ordered list of regions grouped under structural
//! roots. Used by the CLI and tests; real hosts implement [`RegionProvider`]
//! over their own document tree.

use crate::document::region::{
    ContainerRef, Direction, DocumentPoint, RegionId, RegionProvider, RootId, RunKind, TextRun,
};
use crate::error::{ReadalongError, Result};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct RegionEntry {
    id: RegionId,
    root: RootId,
    runs: Vec<TextRun>,
    excluded: bool,
}

#[derive(Debug, Default)]
struct Inner {
    regions: Vec<RegionEntry>,
    revision: u64,
    next_region: u64,
    next_container: u64,
}

impl Inner {
    fn entry(&self, region: RegionId) -> Option<&RegionEntry> {
        self.regions.iter().find(|e| e.id == region)
    }

    fn entry_mut(&mut self, region: RegionId) -> Result<&mut RegionEntry> {
        self.regions
            .iter_mut()
            .find(|e| e.id == region)
            .ok_or(ReadalongError::UnknownRegion { region: region.0 })
    }

    fn container(&mut self) -> ContainerRef {
        self.next_container += 1;
        ContainerRef(self.next_container)
    }
}

#[derive(Debug, Default)]
pub struct StaticDocument {
    inner: RwLock<Inner>,
}

impl StaticDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a document with one root holding one region per paragraph.
    pub fn from_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> Self {
        let doc = Self::new();
        for paragraph in paragraphs {
            doc.add_region(RootId(0), paragraph.as_ref());
        }
        doc
    }

    /// Appends a region with a single readable run and returns its id.
    pub fn add_region(&self, root: RootId, text: &str) -> RegionId {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.next_region += 1;
        let id = RegionId(inner.next_region);
        let container = inner.container();
        inner.regions.push(RegionEntry {
            id,
            root,
            runs: vec![TextRun::readable(container, text)],
            excluded: false,
        });
        inner.revision += 1;
        id
    }

    /// Appends a run of the given kind to an existing region.
    pub fn add_run(&self, region: RegionId, text: &str, kind: RunKind) -> Result<ContainerRef> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let container = inner.container();
        inner.entry_mut(region)?.runs.push(TextRun {
            container,
            text: text.to_string(),
            kind,
        });
        inner.revision += 1;
        Ok(container)
    }

    /// Replaces a region's text with a single readable run.
    pub fn set_text(&self, region: RegionId, text: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let container = inner.container();
        inner.entry_mut(region)?.runs = vec![TextRun::readable(container, text)];
        inner.revision += 1;
        Ok(())
    }

    /// Marks a region as structurally excluded (navigation, aside...).
    pub fn exclude_region(&self, region: RegionId) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.entry_mut(region)?.excluded = true;
        inner.revision += 1;
        Ok(())
    }

    /// Container of the region's first run, handy for building points.
    pub fn first_container(&self, region: RegionId) -> Option<ContainerRef> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .entry(region)
            .and_then(|e| e.runs.first())
            .map(|run| run.container)
    }

    pub fn region_ids(&self) -> Vec<RegionId> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.regions.iter().map(|e| e.id).collect()
    }
}

impl RegionProvider for StaticDocument {
    fn revision(&self) -> u64 {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).revision
    }

    fn text_runs(&self, region: RegionId) -> Result<Vec<TextRun>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .entry(region)
            .map(|e| e.runs.clone())
            .ok_or(ReadalongError::UnknownRegion { region: region.0 })
    }

    fn region_at(&self, point: DocumentPoint) -> Option<RegionId> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .regions
            .iter()
            .filter(|e| !e.excluded)
            .find(|e| e.runs.iter().any(|run| run.container == point.container))
            .map(|e| e.id)
    }

    fn structural_root(&self, region: RegionId) -> Option<RootId> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.entry(region).map(|e| e.root)
    }

    fn readable_regions(&self, root: RootId) -> Vec<RegionId> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .regions
            .iter()
            .filter(|e| e.root == root && !e.excluded)
            .map(|e| e.id)
            .collect()
    }

    fn adjacent_region(&self, region: RegionId, direction: Direction) -> Option<RegionId> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let pos = inner.regions.iter().position(|e| e.id == region)?;
        let candidates: Box<dyn Iterator<Item = &RegionEntry>> = match direction {
            Direction::Forward => Box::new(inner.regions[pos + 1..].iter()),
            Direction::Backward => Box::new(inner.regions[..pos].iter().rev()),
        };
        candidates.filter(|e| !e.excluded).map(|e| e.id).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_in_document_order() {
        let doc = StaticDocument::from_paragraphs(&["one", "two", "three"]);
        let ids = doc.region_ids();
        assert_eq!(ids.len(), 3);
        assert_eq!(doc.readable_regions(RootId(0)), ids);
    }

    #[test]
    fn test_adjacent_skips_excluded() {
        let doc = StaticDocument::from_paragraphs(&["a", "nav", "b"]);
        let ids = doc.region_ids();
        doc.exclude_region(ids[1]).unwrap();

        assert_eq!(doc.adjacent_region(ids[0], Direction::Forward), Some(ids[2]));
        assert_eq!(doc.adjacent_region(ids[2], Direction::Backward), Some(ids[0]));
        assert_eq!(doc.adjacent_region(ids[2], Direction::Forward), None);
        assert_eq!(doc.adjacent_region(ids[0], Direction::Backward), None);
    }

    #[test]
    fn test_adjacent_crosses_roots() {
        let doc = StaticDocument::new();
        let a = doc.add_region(RootId(1), "first root");
        let b = doc.add_region(RootId(2), "second root");

        assert_eq!(doc.readable_regions(RootId(1)), vec![a]);
        assert_eq!(doc.adjacent_region(a, Direction::Forward), Some(b));
    }

    #[test]
    fn test_revision_bumps_on_change() {
        let doc = StaticDocument::from_paragraphs(&["text"]);
        let id = doc.region_ids()[0];
        let before = doc.revision();
        doc.set_text(id, "new text").unwrap();
        assert!(doc.revision() > before);
    }

    #[test]
    fn test_region_at_point() {
        let doc = StaticDocument::from_paragraphs(&["alpha", "beta"]);
        let ids = doc.region_ids();
        let container = doc.first_container(ids[1]).unwrap();

        let point = DocumentPoint {
            container,
            offset: 2,
        };
        assert_eq!(doc.region_at(point), Some(ids[1]));
    }

    #[test]
    fn test_unknown_region_errors() {
        let doc = StaticDocument::new();
        assert!(matches!(
            doc.text_runs(RegionId(99)),
            Err(ReadalongError::UnknownRegion { region: 99 })
        ));
        assert!(doc.set_text(RegionId(99), "x").is_err());
    }

    #[test]
    fn test_add_run_with_kind() {
        let doc = StaticDocument::from_paragraphs(&["visible"]);
        let id = doc.region_ids()[0];
        doc.add_run(id, "secret", RunKind::Hidden).unwrap();

        let runs = doc.text_runs(id).unwrap();
        assert_eq!(runs.len(), 2);
        assert!(!runs[1].is_readable());
    }
}
