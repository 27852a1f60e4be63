use std::fmt::{Display, Formatter};

use derive_more::Constructor;

use super::error::DecodeError;

/// Kind of run-length alignment operation, mirrors the SAM CIGAR alphabet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum OpKind {
    /// `M`: aligned bases that may or may not match the reference.
    Match,
    /// `=`: aligned bases known to match the reference.
    SeqMatch,
    /// `X`: aligned bases known to differ from the reference.
    Mismatch,
    /// `D`: reference bases absent from the read.
    Deletion,
    /// `I`: read bases absent from the reference.
    Insertion,
    /// `N`: skipped reference region (e.g. intron).
    Skip,
    /// `P`: padding.
    Pad,
    /// `S`: read bases that are present in the record but not aligned.
    SoftClip,
    /// `H`: read bases removed from the record.
    HardClip,
}

impl OpKind {
    pub fn symbol(&self) -> char {
        match self {
            OpKind::Match => 'M',
            OpKind::SeqMatch => '=',
            OpKind::Mismatch => 'X',
            OpKind::Deletion => 'D',
            OpKind::Insertion => 'I',
            OpKind::Skip => 'N',
            OpKind::Pad => 'P',
            OpKind::SoftClip => 'S',
            OpKind::HardClip => 'H',
        }
    }

    /// Whether the operation spans reference bases in the SAM sense.
    pub fn consumes_reference(&self) -> bool {
        matches!(
            self,
            OpKind::Match | OpKind::SeqMatch | OpKind::Mismatch | OpKind::Deletion | OpKind::Skip
        )
    }

    /// Whether the operation moves the reference cursor of the decoder. Unlike
    /// [`OpKind::consumes_reference`], padding counts too. Alignment stops are derived from it.
    pub fn advances_reference(&self) -> bool {
        self.consumes_reference() || matches!(self, OpKind::Pad)
    }

    pub fn consumes_read(&self) -> bool {
        matches!(
            self,
            OpKind::Match
                | OpKind::SeqMatch
                | OpKind::Mismatch
                | OpKind::Insertion
                | OpKind::SoftClip
        )
    }
}

impl TryFrom<char> for OpKind {
    type Error = DecodeError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        Ok(match value {
            'M' => OpKind::Match,
            '=' => OpKind::SeqMatch,
            'X' => OpKind::Mismatch,
            'D' => OpKind::Deletion,
            'I' => OpKind::Insertion,
            'N' => OpKind::Skip,
            'P' => OpKind::Pad,
            'S' => OpKind::SoftClip,
            'H' => OpKind::HardClip,
            other => {
                return Err(DecodeError::Cigar(format!(
                    "unknown operation '{other}'"
                )))
            }
        })
    }
}

/// A single run of the alignment operation string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Constructor)]
pub struct CigarOp {
    pub kind: OpKind,
    pub len: usize,
}

impl Display for CigarOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.len, self.kind.symbol())
    }
}

/// Parse a textual operation string such as `10M2I5M`. `*` stands for an absent string.
pub fn parse(cigar: &str) -> Result<Vec<CigarOp>, DecodeError> {
    if cigar == "*" {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    let mut len: Option<usize> = None;
    for symbol in cigar.chars() {
        if let Some(digit) = symbol.to_digit(10) {
            let current = len.unwrap_or(0);
            len = Some(
                current
                    .checked_mul(10)
                    .and_then(|x| x.checked_add(digit as usize))
                    .ok_or_else(|| DecodeError::Cigar(format!("run length overflow in {cigar}")))?,
            );
            continue;
        }

        let kind = OpKind::try_from(symbol)?;
        match len.take() {
            Some(len) if len > 0 => ops.push(CigarOp::new(kind, len)),
            _ => {
                return Err(DecodeError::Cigar(format!(
                    "operation '{symbol}' without a positive length in {cigar}"
                )))
            }
        }
    }

    if len.is_some() {
        return Err(DecodeError::Cigar(format!(
            "trailing run length without operation in {cigar}"
        )));
    }
    Ok(ops)
}

/// Number of reference positions the decoder walks over, padding included.
pub fn reference_len(ops: &[CigarOp]) -> usize {
    ops.iter()
        .filter(|op| op.kind.advances_reference())
        .map(|op| op.len)
        .sum()
}

/// Number of read bases stored in the record for the operations.
pub fn read_len(ops: &[CigarOp]) -> usize {
    ops.iter()
        .filter(|op| op.kind.consumes_read())
        .map(|op| op.len)
        .sum()
}
