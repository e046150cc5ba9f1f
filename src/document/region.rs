//! Document model seen by the core: regions, text runs, words, and the
//! region provider port the host implements.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A readable text container (paragraph, list item, table cell...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u64);

/// The structural ancestor a reading flow is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootId(pub u64);

/// Host handle for the text node a word lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// A position inside a text node, e.g. a selection caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPoint {
    pub container: ContainerRef,
    /// Byte offset into the container's text.
    pub offset: usize,
}

/// Stepping direction for word and region navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Next index in this direction, or `None` when it leaves `0..len`.
    pub fn step(self, index: usize, len: usize) -> Option<usize> {
        match self {
            Direction::Forward => index.checked_add(1).filter(|&next| next < len),
            Direction::Backward => index.checked_sub(1).filter(|&prev| prev < len),
        }
    }
}

/// Why a run of text is or is not read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunKind {
    Readable,
    /// Not rendered (display:none, collapsed, aria-hidden).
    Hidden,
    /// Inside an editable field.
    Editable,
    /// Inside navigation, asides and similar chrome.
    Excluded,
}

/// Contiguous text from one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub container: ContainerRef,
    pub text: String,
    pub kind: RunKind,
}

impl TextRun {
    pub fn readable(container: ContainerRef, text: &str) -> Self {
        Self {
            container,
            text: text.to_string(),
            kind: RunKind::Readable,
        }
    }

    pub fn is_readable(&self) -> bool {
        self.kind == RunKind::Readable
    }
}

/// One word's location in the document and its surface text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub container: ContainerRef,
    /// Byte offset of the first character within the container's text.
    pub start_offset: usize,
    /// Byte offset one past the last character.
    pub end_offset: usize,
    pub text: String,
}

/// Host-side view of the document.
///
/// Traversal, visibility and structural exclusion are host concerns; the
/// core only asks for text and neighbours.
pub trait RegionProvider: Send + Sync {
    /// Bumped whenever the document changes in a way that invalidates words or flow.
    fn revision(&self) -> u64;

    /// Text runs of a region in document order, readable or not.
    fn text_runs(&self, region: RegionId) -> Result<Vec<TextRun>>;

    /// Nearest readable region enclosing `point`.
    fn region_at(&self, point: DocumentPoint) -> Option<RegionId>;

    /// Structural ancestor used to build the reading flow for `region`.
    fn structural_root(&self, region: RegionId) -> Option<RootId>;

    /// Readable regions under `root`, in document order.
    fn readable_regions(&self, root: RootId) -> Vec<RegionId>;

    /// Next or previous readable region in document order, skipping excluded
    /// structure. This is the slow path used when the reading flow is stale.
    fn adjacent_region(&self, region: RegionId, direction: Direction) -> Option<RegionId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_step_within_bounds() {
        assert_eq!(Direction::Forward.step(0, 3), Some(1));
        assert_eq!(Direction::Forward.step(2, 3), None);
        assert_eq!(Direction::Backward.step(2, 3), Some(1));
        assert_eq!(Direction::Backward.step(0, 3), None);
    }

    #[test]
    fn test_direction_step_empty() {
        assert_eq!(Direction::Forward.step(0, 0), None);
        assert_eq!(Direction::Backward.step(0, 0), None);
    }

    #[test]
    fn test_text_run_readable() {
        let run = TextRun::readable(ContainerRef(1), "hello");
        assert!(run.is_readable());
        let hidden = TextRun {
            kind: RunKind::Hidden,
            ..run
        };
        assert!(!hidden.is_readable());
    }

    #[test]
    fn test_region_display() {
        assert_eq!(RegionId(7).to_string(), "region#7");
    }
}
