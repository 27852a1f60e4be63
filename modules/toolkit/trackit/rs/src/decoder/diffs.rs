use ahash::AHashMap;

use readscope_core_rs::loc::Pos;
use readscope_core_rs::nucleotide::{self, GAP};
use readscope_io_rs::alignment::cigar::OpKind;
use readscope_io_rs::alignment::{DecodeError, RawAlignment};

use crate::coverage::Layer;
use crate::mapping::{Diff, ReferenceGap};
use crate::result::Layered;

use super::window::RefWindow;

/// Differences of one record against the reference.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Reconstruction {
    pub count: u32,
    pub diffs: Vec<Diff>,
    pub gaps: Vec<ReferenceGap>,
}

/// Number of differences that can be told without looking at the reference: explicit mismatches,
/// deletions and insertions.
pub fn count_without_reference(record: &RawAlignment) -> u32 {
    record
        .cigar()
        .iter()
        .filter(|op| {
            matches!(
                op.kind,
                OpKind::Mismatch | OpKind::Deletion | OpKind::Insertion
            )
        })
        .map(|op| run_len(op.len))
        .fold(0u32, u32::saturating_add)
}

// BAM run lengths are 28-bit, larger values only come from hand-written strings
fn run_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Walk the CIGAR of a record against the reference and collect its diffs and gaps.
pub fn reconstruct(
    record: &RawAlignment,
    window: &mut RefWindow,
) -> Result<Reconstruction, DecodeError> {
    let needed = record
        .cigar()
        .iter()
        .filter(|op| op.kind.consumes_read())
        .map(|op| op.len)
        .sum::<usize>();
    let sequence = record.sequence();
    if sequence.len() < needed {
        return Err(DecodeError::Truncated {
            what: "read sequence",
            needed,
            available: sequence.len(),
        });
    }

    let (offset, reference) = window.bases(record.span()?)?;
    if offset != *record.start() || reference.len() < (record.stop() - offset + 1) as usize {
        return Err(DecodeError::Truncated {
            what: "reference sequence",
            needed: (record.stop() - record.start() + 1) as usize,
            available: reference.len(),
        });
    }

    let reverse = *record.is_reverse();
    let is_forward = !reverse;
    let mut result = Reconstruction::default();
    let mut order: AHashMap<Pos, u32> = AHashMap::new();

    let (mut refpos, mut readpos) = (*record.start(), 0usize);
    for op in record.cigar() {
        let len = op.len;
        match op.kind {
            OpKind::Match | OpKind::SeqMatch => {
                for i in 0..len {
                    let pos = refpos + i as Pos;
                    let base = sequence[readpos + i];
                    let expected = reference.get((pos - offset) as usize).ok_or_else(|| {
                        DecodeError::Coordinates(format!(
                            "operations of {} run past its stop {}",
                            record.name(),
                            record.stop()
                        ))
                    })?;
                    if !nucleotide::same_base(base, *expected) {
                        result.diffs.push(Diff::new(
                            pos,
                            nucleotide::oriented(base, reverse),
                            is_forward,
                            1,
                        ));
                        result.count += 1;
                    }
                }
            }
            OpKind::Mismatch => {
                for i in 0..len {
                    let base = sequence[readpos + i];
                    result.diffs.push(Diff::new(
                        refpos + i as Pos,
                        nucleotide::oriented(base, reverse),
                        is_forward,
                        1,
                    ));
                }
                result.count = result.count.saturating_add(run_len(len));
            }
            OpKind::Deletion => {
                for i in 0..len {
                    result
                        .diffs
                        .push(Diff::new(refpos + i as Pos, GAP, is_forward, 1));
                }
                result.count = result.count.saturating_add(run_len(len));
            }
            OpKind::Insertion => {
                let next = order.entry(refpos).or_insert(0);
                for base in &sequence[readpos..readpos + len] {
                    result.gaps.push(ReferenceGap::new(
                        refpos,
                        *next,
                        nucleotide::oriented(*base, reverse),
                        is_forward,
                        1,
                    ));
                    *next += 1;
                }
                result.count = result.count.saturating_add(run_len(len));
            }
            OpKind::Skip | OpKind::Pad | OpKind::SoftClip | OpKind::HardClip => {}
        }

        if op.kind.advances_reference() {
            refpos += len as Pos;
        }
        if op.kind.consumes_read() {
            readpos += len;
        }
    }
    Ok(result)
}

/// Diffs and gaps of many records folded by position, base, strand and layer.
#[derive(Clone, Debug, Default)]
pub struct DiffTally {
    diffs: AHashMap<(Layer, Pos, u8, bool), u32>,
    gaps: AHashMap<(Layer, Pos, u32, u8, bool), u32>,
}

impl DiffTally {
    pub fn add(&mut self, layer: Layer, reconstruction: &Reconstruction) {
        for diff in &reconstruction.diffs {
            *self
                .diffs
                .entry((layer, diff.position, diff.base, diff.is_forward))
                .or_insert(0) += diff.count;
        }
        for gap in &reconstruction.gaps {
            *self
                .gaps
                .entry((layer, gap.position, gap.order, gap.base, gap.is_forward))
                .or_insert(0) += gap.count;
        }
    }

    pub fn merge(&mut self, other: DiffTally) {
        for (key, count) in other.diffs {
            *self.diffs.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.gaps {
            *self.gaps.entry(key).or_insert(0) += count;
        }
    }

    /// Layered diffs and gaps sorted by position.
    pub fn finish(self) -> (Vec<Layered<Diff>>, Vec<Layered<ReferenceGap>>) {
        let mut diffs: Vec<_> = self
            .diffs
            .into_iter()
            .map(|((layer, position, base, is_forward), count)| {
                Layered::new(layer, Diff::new(position, base, is_forward, count))
            })
            .collect();
        diffs.sort_by_key(|x| (x.item.position, x.layer, !x.item.is_forward, x.item.base));

        let mut gaps: Vec<_> = self
            .gaps
            .into_iter()
            .map(|((layer, position, order, base, is_forward), count)| {
                Layered::new(
                    layer,
                    ReferenceGap::new(position, order, base, is_forward, count),
                )
            })
            .collect();
        gaps.sort_by_key(|x| {
            (
                x.item.position,
                x.item.order,
                x.layer,
                !x.item.is_forward,
                x.item.base,
            )
        });
        (diffs, gaps)
    }
}

#[cfg(test)]
mod tests {
    use readscope_core_rs::loc::Span;
    use readscope_core_rs::reference::InMemoryReference;
    use readscope_io_rs::alignment::cigar;

    use super::*;

    fn decode(reference: &str, start: Pos, ops: &str, read: &str) -> eyre::Result<Reconstruction> {
        let reference = InMemoryReference::new().with("chr1", reference)?;
        let limits = Span::new(1, reference_len(&reference))?;
        let mut window = RefWindow::new(&reference, 0, limits);
        let record = RawAlignment::mapped("read", start, cigar::parse(ops)?, read.as_bytes())?;
        Ok(reconstruct(&record, &mut window)?)
    }

    fn reference_len(reference: &InMemoryReference) -> Pos {
        use readscope_core_rs::reference::Reference;
        reference.chromosome(0).map_or(0, |x| *x.length())
    }

    #[test]
    fn test_single_mismatch() -> eyre::Result<()> {
        let result = decode("ACGTACGT", 1, "8M", "ACGAACGT")?;
        assert_eq!(result.diffs, vec![Diff::new(4, b'A', true, 1)]);
        assert!(result.gaps.is_empty());
        assert_eq!(result.count, 1);
        Ok(())
    }

    #[test]
    fn test_match_is_case_insensitive() -> eyre::Result<()> {
        let result = decode("ACGTACGT", 1, "8M", "acgtacgt")?;
        assert_eq!(result, Reconstruction::default());
        Ok(())
    }

    #[test]
    fn test_indels_and_clips() -> eyre::Result<()> {
        // ref:    A C G T A C G T   A C G T
        // read: t t   C G - - C G T a a A
        let result = decode("ACGTACGTACGT", 2, "2S2M2D3M2I1M", "TTCGCGTAAA")?;
        assert_eq!(
            result.diffs,
            vec![Diff::new(4, GAP, true, 1), Diff::new(5, GAP, true, 1)]
        );
        assert_eq!(
            result.gaps,
            vec![
                ReferenceGap::new(9, 0, b'A', true, 1),
                ReferenceGap::new(9, 1, b'A', true, 1),
            ]
        );
        assert_eq!(result.count, 4);
        Ok(())
    }

    #[test]
    fn test_reverse_strand_bases_are_complemented() -> eyre::Result<()> {
        let reference = InMemoryReference::new().with("chr1", "ACGTACGT")?;
        let mut window = RefWindow::new(&reference, 0, Span::new(1, 8)?);
        let record = RawAlignment::mapped("read", 1, cigar::parse("3M1X4M")?, "ACGAACGT")?
            .with_reverse(true);
        let result = reconstruct(&record, &mut window)?;
        assert_eq!(result.diffs, vec![Diff::new(4, b'T', false, 1)]);
        assert_eq!(count_without_reference(&record), 1);
        Ok(())
    }

    #[test]
    fn test_skip_advances_reference_only() -> eyre::Result<()> {
        let result = decode("ACGTACGTAC", 1, "2M5N3M", "ACTAC")?;
        assert_eq!(result, Reconstruction::default());
        Ok(())
    }

    #[test]
    fn test_padding_advances_reference_only() -> eyre::Result<()> {
        let result = decode("ACGTACGT", 1, "2M1P2M", "ACGT")?;
        assert_eq!(
            result.diffs,
            vec![Diff::new(4, b'G', true, 1), Diff::new(5, b'T', true, 1)]
        );
        assert_eq!(result.count, 2);
        Ok(())
    }

    #[test]
    fn test_truncated_read() -> eyre::Result<()> {
        assert!(decode("ACGTACGT", 1, "8M", "ACGT").is_err());
        Ok(())
    }

    #[test]
    fn test_tally() {
        let mut tally = DiffTally::default();
        let rec = Reconstruction {
            count: 1,
            diffs: vec![Diff::new(4, b'A', true, 1)],
            gaps: vec![ReferenceGap::new(2, 0, b'C', false, 1)],
        };
        tally.add(Layer::Perfect, &rec);
        tally.add(Layer::Perfect, &rec);
        tally.add(Layer::Common, &rec);

        let (diffs, gaps) = tally.finish();
        assert_eq!(
            diffs,
            vec![
                Layered::new(Layer::Perfect, Diff::new(4, b'A', true, 2)),
                Layered::new(Layer::Common, Diff::new(4, b'A', true, 1)),
            ]
        );
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].item.count, 2);
    }
}
