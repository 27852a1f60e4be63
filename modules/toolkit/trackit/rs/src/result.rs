use std::sync::Arc;

use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;

use crate::coverage::{CoverageAccumulator, Layer};
use crate::decoder::ReadPairGroup;
use crate::mapping::{Diff, Mapping, ReferenceGap};
use crate::request::IntervalRequest;

/// Item tagged with the accumulator layer it was counted in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Constructor)]
pub struct Layered<T> {
    pub layer: Layer,
    pub item: T,
}

#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve, Constructor)]
pub struct CoverageResult {
    coverage: CoverageAccumulator,
    /// Empty unless the request asked for diffs and gaps.
    diffs: Vec<Layered<Diff>>,
    gaps: Vec<Layered<ReferenceGap>>,
}

/// Data computed for a request. Its variant follows the requested data kind.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TrackResult {
    Coverage(CoverageResult),
    Mappings(Vec<Mapping>),
    ReadPairs(Vec<ReadPairGroup>),
}

impl TrackResult {
    pub fn coverage(&self) -> Option<&CoverageResult> {
        match self {
            TrackResult::Coverage(x) => Some(x),
            _ => None,
        }
    }

    pub fn mappings(&self) -> Option<&[Mapping]> {
        match self {
            TrackResult::Mappings(x) => Some(x),
            _ => None,
        }
    }

    pub fn read_pairs(&self) -> Option<&[ReadPairGroup]> {
        match self {
            TrackResult::ReadPairs(x) => Some(x),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TrackResult::Coverage(x) => x.coverage.populated().is_empty(),
            TrackResult::Mappings(x) => x.is_empty(),
            TrackResult::ReadPairs(x) => x.is_empty(),
        }
    }
}

/// What a requester receives: the request being answered and the shared result. Cached results
/// are handed out again without copying.
#[derive(Clone, Debug, Getters, Dissolve, Constructor)]
pub struct Delivery {
    request: IntervalRequest,
    result: Arc<TrackResult>,
}
