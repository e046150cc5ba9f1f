//! Reading flow: the ordered readable regions under one structural root.
//!
//! Directional stepping consults the cached flow first and falls back to the
//! provider's document-order walk when the flow is stale, does not contain
//! the region, or the step leaves the flow's root.

use crate::defaults;
use crate::document::index::ElementIndex;
use crate::document::region::{Direction, RegionId, RegionProvider, RootId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingFlow {
    root: RootId,
    regions: Vec<RegionId>,
    revision: u64,
}

impl ReadingFlow {
    pub fn build(provider: &dyn RegionProvider, root: RootId) -> Self {
        let regions = provider.readable_regions(root);
        tracing::debug!(root = root.0, regions = regions.len(), "built reading flow");
        Self {
            root,
            regions,
            revision: provider.revision(),
        }
    }

    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    pub fn is_current(&self, provider: &dyn RegionProvider) -> bool {
        self.revision == provider.revision()
    }

    pub fn position(&self, region: RegionId) -> Option<usize> {
        self.regions.iter().position(|&r| r == region)
    }
}

/// Next or previous readable region of `region`.
///
/// Rebuilds `flow` when it is missing, stale, or built for another root.
pub fn resolve_adjacent(
    provider: &dyn RegionProvider,
    flow: &mut Option<ReadingFlow>,
    region: RegionId,
    direction: Direction,
) -> Option<RegionId> {
    if let Some(root) = provider.structural_root(region) {
        let rebuild = flow
            .as_ref()
            .is_none_or(|f| f.root != root || !f.is_current(provider));
        if rebuild {
            *flow = Some(ReadingFlow::build(provider, root));
        }
    }

    if let Some(f) = flow.as_ref().filter(|f| f.is_current(provider))
        && let Some(pos) = f.position(region)
        && let Some(next) = direction.step(pos, f.regions.len())
    {
        return Some(f.regions[next]);
    }

    provider.adjacent_region(region, direction)
}

/// Next region in `direction` that has at least one readable word.
///
/// Empty regions are skipped, up to [`defaults::MAX_REGION_HOPS`] of them.
/// Regions the provider can no longer produce text for are skipped too.
pub fn next_nonempty_region(
    provider: &dyn RegionProvider,
    flow: &mut Option<ReadingFlow>,
    index: &mut ElementIndex,
    from: RegionId,
    direction: Direction,
    max_chars: usize,
) -> Option<RegionId> {
    let mut current = from;
    for _ in 0..defaults::MAX_REGION_HOPS {
        let candidate = resolve_adjacent(provider, flow, current, direction)?;
        match index.ensure_state(provider, candidate, max_chars) {
            Ok(state) if !state.is_empty() => return Some(candidate),
            Ok(_) => tracing::debug!(region = %candidate, "skipping empty region"),
            Err(e) => tracing::warn!(region = %candidate, error = %e, "skipping unreadable region"),
        }
        current = candidate;
    }
    tracing::warn!(%from, hops = defaults::MAX_REGION_HOPS, "gave up looking for a readable region");
    None
}
