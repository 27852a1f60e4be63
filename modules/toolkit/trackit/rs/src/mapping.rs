use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;

use readscope_core_rs::loc::{Pos, Span, Strand};
use readscope_io_rs::alignment::Classification;

/// Single-base substitution or deletion at a reference position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Constructor, Dissolve)]
pub struct Diff {
    pub position: Pos,
    /// Read base in the orientation of the read. Deletions carry the gap marker.
    pub base: u8,
    pub is_forward: bool,
    /// Number of records supporting the difference.
    pub count: u32,
}

/// Base inserted into the read after a reference position. Bases of a multi-base insertion share
/// the position and are told apart by `order`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Constructor, Dissolve)]
pub struct ReferenceGap {
    pub position: Pos,
    pub order: u32,
    pub base: u8,
    pub is_forward: bool,
    pub count: u32,
}

/// One decoded alignment as seen by consumers.
#[derive(Clone, PartialEq, Eq, Debug, Getters)]
pub struct Mapping {
    track: usize,
    start: Pos,
    stop: Pos,
    is_forward: bool,
    num_replicates: u32,
    num_differences: u32,
    is_best_mapping: bool,
    num_mappings_for_read: u32,
    classification: Option<Classification>,
    diffs: Vec<Diff>,
    gaps: Vec<ReferenceGap>,
    trimmed: Option<(u32, u32)>,
}

impl Mapping {
    pub fn new(track: usize, span: Span, strand: Strand) -> Self {
        Self {
            track,
            start: span.start(),
            stop: span.stop(),
            is_forward: strand.is_forward(),
            num_replicates: 1,
            num_differences: 0,
            is_best_mapping: false,
            num_mappings_for_read: 1,
            classification: None,
            diffs: Vec::new(),
            gaps: Vec::new(),
            trimmed: None,
        }
    }

    pub fn with_classification(mut self, classification: Option<Classification>) -> Self {
        self.classification = classification;
        self.is_best_mapping = matches!(
            classification,
            Some(Classification::Perfect | Classification::BestMatch)
        );
        self
    }

    pub fn with_num_mappings_for_read(mut self, loci: u32) -> Self {
        self.num_mappings_for_read = loci;
        self
    }

    pub fn with_differences(mut self, count: u32, diffs: Vec<Diff>, gaps: Vec<ReferenceGap>) -> Self {
        self.num_differences = count;
        self.diffs = diffs;
        self.gaps = gaps;
        self
    }

    pub fn with_trimmed(mut self, trimmed: Option<(u32, u32)>) -> Self {
        self.trimmed = trimmed;
        self
    }

    pub fn strand(&self) -> Strand {
        Strand::from_reverse_flag(!self.is_forward)
    }

    pub fn span(&self) -> Span {
        // Mappings are only built from valid spans
        Span::new(self.start, self.stop).unwrap_or_else(|_| unreachable!())
    }

    pub fn len(&self) -> usize {
        (self.stop - self.start + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `other` describes the same placement and can be folded into this mapping.
    pub fn is_replicate_of(&self, other: &Mapping) -> bool {
        self.start == other.start && self.stop == other.stop && self.is_forward == other.is_forward
    }

    pub(crate) fn add_replicate(&mut self) {
        self.num_replicates += 1;
    }

    /// Approximate mate placed at `start` with the same length and no differences.
    pub(crate) fn synthesized_mate(&self, start: Pos, is_forward: bool) -> Self {
        Self {
            track: self.track,
            start,
            stop: start + (self.stop - self.start),
            is_forward,
            num_replicates: 1,
            num_differences: 0,
            is_best_mapping: self.is_best_mapping,
            num_mappings_for_read: self.num_mappings_for_read,
            classification: self.classification,
            diffs: Vec::new(),
            gaps: Vec::new(),
            trimmed: None,
        }
    }
}
