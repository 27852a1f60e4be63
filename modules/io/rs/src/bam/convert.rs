use noodles::bam;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;

use readscope_core_rs::loc::Pos;

use crate::alignment::cigar::{CigarOp, OpKind};
use crate::alignment::{Classification, DecodeError, MateInfo, RawAlignment};

/// Optional integer attribute written by the mapping pipeline.
#[derive(Clone, Copy, Debug)]
pub struct Attribute {
    pub name: &'static str,
    tag: [u8; 2],
}

impl Attribute {
    const fn new(name: &'static str, tag: [u8; 2]) -> Self {
        Self { name, tag }
    }

    fn get(&self, data: &bam::record::Data) -> Result<Option<i64>, DecodeError> {
        match data.get(&Tag::from(self.tag)) {
            None => Ok(None),
            Some(value) => value?
                .as_int()
                .map(Some)
                .ok_or_else(|| DecodeError::attribute(self.name, "not an integer value")),
        }
    }

    fn get_as<T: TryFrom<i64>>(&self, data: &bam::record::Data) -> Result<Option<T>, DecodeError> {
        self.get(data)?
            .map(|value| {
                T::try_from(value)
                    .map_err(|_| DecodeError::attribute(self.name, format!("{value} is out of range")))
            })
            .transpose()
    }
}

pub const CLASSIFICATION: Attribute = Attribute::new("Yc", *b"Yc");
pub const LOCI_COUNT: Attribute = Attribute::new("NH", *b"NH");
pub const PAIR_ID: Attribute = Attribute::new("Yi", *b"Yi");
pub const PAIR_TYPE: Attribute = Attribute::new("Ys", *b"Ys");
pub const TRIMMED_LEFT: Attribute = Attribute::new("Tl", *b"Tl");
pub const TRIMMED_RIGHT: Attribute = Attribute::new("Tr", *b"Tr");

fn op_kind(kind: Kind) -> OpKind {
    match kind {
        Kind::Match => OpKind::Match,
        Kind::Insertion => OpKind::Insertion,
        Kind::Deletion => OpKind::Deletion,
        Kind::Skip => OpKind::Skip,
        Kind::SoftClip => OpKind::SoftClip,
        Kind::HardClip => OpKind::HardClip,
        Kind::Pad => OpKind::Pad,
        Kind::SequenceMatch => OpKind::SeqMatch,
        Kind::SequenceMismatch => OpKind::Mismatch,
    }
}

/// Decode every attribute of a BAM record the engine relies on. The stop is derived from the
/// operations, padding included, so it may lie past the SAM alignment end.
pub fn convert(record: &bam::Record) -> Result<RawAlignment, DecodeError> {
    let flags = record.flags();
    let name = record.name().map(|x| x.to_string()).unwrap_or_default();
    if flags.is_unmapped() {
        return Ok(RawAlignment::unmapped(name));
    }

    let start = record
        .alignment_start()
        .transpose()?
        .ok_or_else(|| DecodeError::Coordinates("mapped record without a start".to_string()))?;
    let cigar = record
        .cigar()
        .iter()
        .map(|op| op.map(|op| CigarOp::new(op_kind(op.kind()), op.len())))
        .collect::<Result<Vec<_>, _>>()?;
    let sequence: Vec<u8> = record.sequence().iter().collect();

    let data = record.data();
    let classification = match CLASSIFICATION.get(&data)? {
        None => None,
        Some(code) => Some(Classification::from_code(code).ok_or_else(|| {
            DecodeError::attribute(CLASSIFICATION.name, format!("unknown class code {code}"))
        })?),
    };
    let loci_count = LOCI_COUNT.get_as::<u32>(&data)?;
    let pair_id = PAIR_ID.get_as::<u64>(&data)?;
    let pair_type = PAIR_TYPE.get_as::<u8>(&data)?;
    let trimmed = match (
        TRIMMED_LEFT.get_as::<u32>(&data)?,
        TRIMMED_RIGHT.get_as::<u32>(&data)?,
    ) {
        (None, None) => None,
        (left, right) => Some((left.unwrap_or(0), right.unwrap_or(0))),
    };

    let mate = if flags.is_segmented() {
        let start = if flags.is_mate_unmapped() {
            None
        } else {
            record
                .mate_alignment_start()
                .transpose()?
                .map(|x| x.get() as Pos)
        };
        Some(MateInfo {
            is_first: flags.is_first_segment(),
            is_last: flags.is_last_segment(),
            start,
            is_reverse: flags.is_mate_reverse_complemented(),
        })
    } else {
        None
    };

    Ok(RawAlignment::mapped(name, start.get() as Pos, cigar, sequence)?
        .with_reverse(flags.is_reverse_complemented())
        .with_mapping_quality(record.mapping_quality().map(|x| x.get()))
        .with_classification(classification)
        .with_loci_count(loci_count)
        .with_mate(mate)
        .with_pair(pair_id, pair_type)
        .with_trimmed(trimmed))
}
