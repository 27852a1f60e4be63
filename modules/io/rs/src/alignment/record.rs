use derive_getters::Getters;

use readscope_core_rs::loc::{Pos, Span, Strand};

use super::cigar::{self, CigarOp};
use super::error::DecodeError;

/// Quality bucket stored with each alignment by the mapping pipeline.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Classification {
    /// Alignment without any mismatch.
    Perfect,
    /// Lowest-error alignment of its source read.
    BestMatch,
    /// Any other accepted alignment.
    Common,
}

impl Classification {
    /// Integer code used by the `Yc` attribute.
    pub fn code(&self) -> i64 {
        match self {
            Classification::Perfect => 3,
            Classification::BestMatch => 2,
            Classification::Common => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            3 => Some(Classification::Perfect),
            2 => Some(Classification::BestMatch),
            1 => Some(Classification::Common),
            _ => None,
        }
    }
}

/// Mate information of a paired-end record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct MateInfo {
    pub is_first: bool,
    pub is_last: bool,
    /// Alignment start of the mate, if it is mapped.
    pub start: Option<Pos>,
    pub is_reverse: bool,
}

/// Owned view of one alignment record with every attribute the decoder needs.
#[derive(Clone, PartialEq, Eq, Debug, Getters)]
pub struct RawAlignment {
    name: String,
    is_unmapped: bool,
    start: Pos,
    stop: Pos,
    is_reverse: bool,
    mapping_quality: Option<u8>,
    classification: Option<Classification>,
    loci_count: Option<u32>,
    cigar: Vec<CigarOp>,
    sequence: Vec<u8>,
    mate: Option<MateInfo>,
    pair_id: Option<u64>,
    pair_type: Option<u8>,
    trimmed: Option<(u32, u32)>,
}

impl RawAlignment {
    /// Mapped record on the forward strand. The stop is derived from the operations.
    pub fn mapped(
        name: impl Into<String>,
        start: Pos,
        cigar: Vec<CigarOp>,
        sequence: impl Into<Vec<u8>>,
    ) -> Result<Self, DecodeError> {
        if start < 1 {
            return Err(DecodeError::Coordinates(format!(
                "alignment start must be positive, got {start}"
            )));
        }
        let span = cigar::reference_len(&cigar) as Pos;
        if span == 0 {
            return Err(DecodeError::Cigar(
                "operations do not span any reference base".to_string(),
            ));
        }

        Ok(Self {
            name: name.into(),
            is_unmapped: false,
            start,
            stop: start + span - 1,
            is_reverse: false,
            mapping_quality: None,
            classification: None,
            loci_count: None,
            cigar,
            sequence: sequence.into(),
            mate: None,
            pair_id: None,
            pair_type: None,
            trimmed: None,
        })
    }

    /// Placeholder for a record without a position on the reference.
    pub fn unmapped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_unmapped: true,
            start: 0,
            stop: 0,
            is_reverse: false,
            mapping_quality: None,
            classification: None,
            loci_count: None,
            cigar: Vec::new(),
            sequence: Vec::new(),
            mate: None,
            pair_id: None,
            pair_type: None,
            trimmed: None,
        }
    }

    pub fn with_reverse(mut self, is_reverse: bool) -> Self {
        self.is_reverse = is_reverse;
        self
    }

    pub fn with_mapping_quality(mut self, quality: Option<u8>) -> Self {
        self.mapping_quality = quality;
        self
    }

    pub fn with_classification(mut self, classification: Option<Classification>) -> Self {
        self.classification = classification;
        self
    }

    pub fn with_loci_count(mut self, count: Option<u32>) -> Self {
        self.loci_count = count;
        self
    }

    pub fn with_mate(mut self, mate: Option<MateInfo>) -> Self {
        self.mate = mate;
        self
    }

    pub fn with_pair(mut self, pair_id: Option<u64>, pair_type: Option<u8>) -> Self {
        self.pair_id = pair_id;
        self.pair_type = pair_type;
        self
    }

    pub fn with_trimmed(mut self, trimmed: Option<(u32, u32)>) -> Self {
        self.trimmed = trimmed;
        self
    }

    pub fn strand(&self) -> Strand {
        Strand::from_reverse_flag(self.is_reverse)
    }

    /// Reference span of a mapped record.
    pub fn span(&self) -> Result<Span, DecodeError> {
        Span::new(self.start, self.stop).map_err(|e| DecodeError::Coordinates(e.to_string()))
    }

    /// Position of the read's 5' end on the reference.
    pub fn five_prime(&self) -> Pos {
        if self.is_reverse {
            self.stop
        } else {
            self.start
        }
    }
}
