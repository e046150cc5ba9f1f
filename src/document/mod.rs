//! Document side of the engine: regions, the element index and reading flow.

pub mod flow;
pub mod index;
pub mod region;
pub mod static_doc;

pub use flow::{ReadingFlow, next_nonempty_region, resolve_adjacent};
pub use index::{ElementIndex, ElementState};
pub use region::{
    ContainerRef, Direction, DocumentPoint, RegionId, RegionProvider, RootId, RunKind, TextRun,
    Word,
};
pub use static_doc::StaticDocument;
