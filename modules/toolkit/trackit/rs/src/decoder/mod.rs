use ahash::AHashMap;
use eyre::{eyre, Result, WrapErr};

use readscope_core_rs::loc::{Pos, Span};
use readscope_core_rs::reference::{Chromosome, Reference};
use readscope_io_rs::alignment::{DecodeError, Observer, RawAlignment};

use crate::coverage::CoverageAccumulator;
use crate::mapping::Mapping;
use crate::request::{DataKind, IntervalRequest};
use crate::track::Track;

pub use diffs::{count_without_reference, reconstruct, DiffTally, Reconstruction};
pub use pairs::{bundle, MappingPair, PairCandidate, PairType, PairingConfig, ReadPairGroup};
pub use routing::{route, Slot};
pub use window::RefWindow;

mod diffs;
mod pairs;
mod routing;
mod window;

/// Turns the alignments of a track into coverage, mappings or read pairs for a request.
///
/// Records that fail to decode are reported to the observer and skipped. Failures of the whole
/// source (unknown chromosome, unreadable file) are returned to the caller.
pub struct Decoder<'a> {
    reference: &'a dyn Reference,
    observer: &'a dyn Observer,
    pairing: PairingConfig,
}

impl<'a> Decoder<'a> {
    pub fn new(reference: &'a dyn Reference, observer: &'a dyn Observer, pairing: PairingConfig) -> Self {
        Self {
            reference,
            observer,
            pairing,
        }
    }

    fn chromosome(&self, request: &IntervalRequest) -> Result<Chromosome> {
        self.reference
            .chromosome(*request.chromosome_id())
            .ok_or_else(|| eyre!("Unknown chromosome id: {}", request.chromosome_id()))
    }

    /// Reference window of the request, filled with the total interval upfront when diffs are
    /// going to be reconstructed.
    fn window(
        &self,
        request: &IntervalRequest,
        chromosome: &Chromosome,
        with_diffs: bool,
    ) -> Result<RefWindow<'a>> {
        let mut window = RefWindow::new(self.reference, *request.chromosome_id(), chromosome.span());
        if with_diffs {
            window.preload(request.total_span()).wrap_err_with(|| {
                format!("Failed to load {}:{}", chromosome.name(), request.total_span())
            })?;
        }
        Ok(window)
    }

    /// Feed every included record overlapping the total interval of the request to `apply`.
    fn stream(
        &self,
        track: &Track,
        request: &IntervalRequest,
        chromosome: &Chromosome,
        mut apply: impl FnMut(RawAlignment) -> Result<(), DecodeError>,
    ) -> Result<()> {
        let filter = request.filter();
        let mut source = track
            .connector()
            .open(self.observer)
            .wrap_err_with(|| format!("Failed to open track {}", track.name()))?;
        let records = source
            .fetch(chromosome.name(), request.total_span())
            .wrap_err_with(|| {
                format!(
                    "Failed to query {}:{} in track {}",
                    chromosome.name(),
                    request.total_span(),
                    track.name()
                )
            })?;

        let (mut included, mut failed) = (0usize, 0usize);
        for item in records {
            let outcome = item.and_then(|record| {
                if *record.is_unmapped()
                    || !filter.includes(*record.classification(), *record.loci_count())
                    || !filter.passes_quality(*record.mapping_quality())
                {
                    return Ok(());
                }
                included += 1;
                apply(record)
            });
            if let Err(err) = outcome {
                failed += 1;
                self.observer.on_decode_error(*track.id(), &err);
            }
        }
        log::trace!(
            "Track {}: {included} records included, {failed} skipped on {}:{}",
            track.name(),
            chromosome.name(),
            request.total_span()
        );
        Ok(())
    }

    /// Count the records of a track into the accumulator, collecting their diffs and gaps when a
    /// tally is given.
    pub fn coverage(
        &self,
        track: &Track,
        slot: Slot,
        request: &IntervalRequest,
        accumulator: &mut CoverageAccumulator,
        mut tally: Option<&mut DiffTally>,
    ) -> Result<()> {
        let chromosome = self.chromosome(request)?;
        let mut window = self.window(request, &chromosome, tally.is_some())?;
        let bounds = accumulator.bounds();
        let starts_only = *request.kind() == DataKind::ReadStarts;
        let mode = *request.filter().strand_mode();

        self.stream(track, request, &chromosome, |record| {
            let selection = route(*record.classification(), record.strand(), slot, mode);
            if let Some(tally) = tally.as_deref_mut() {
                let mut found = reconstruct(&record, &mut window)?;
                found.diffs.retain(|d| bounds.contains(d.position));
                found.gaps.retain(|g| bounds.contains(g.position));
                tally.add(selection.layer, &found);
            }

            if starts_only {
                accumulator.increment(selection, record.five_prime());
            } else {
                accumulator.increment_range(selection, *record.start(), *record.stop());
            }
            Ok(())
        })
    }

    /// Individual mappings, or collapsed ones without differences for reduced requests.
    pub fn mappings(&self, track: &Track, request: &IntervalRequest) -> Result<Vec<Mapping>> {
        let chromosome = self.chromosome(request)?;
        let reduced = *request.kind() == DataKind::ReducedMappings;
        let with_diffs = !reduced && *request.needs_diffs_and_gaps();
        let mut window = self.window(request, &chromosome, with_diffs)?;

        let mut mappings: Vec<Mapping> = Vec::new();
        let mut replicates: AHashMap<(Pos, Pos, bool), usize> = AHashMap::new();
        self.stream(track, request, &chromosome, |record| {
            if reduced {
                let key = (*record.start(), *record.stop(), !*record.is_reverse());
                if let Some(ind) = replicates.get(&key) {
                    mappings[*ind].add_replicate();
                    return Ok(());
                }
                replicates.insert(key, mappings.len());
            }
            mappings.push(self.mapping(*track.id(), &record, with_diffs.then_some(&mut window))?);
            Ok(())
        })?;

        mappings.sort_by_key(|m| *m.start());
        Ok(mappings)
    }

    /// Mappings that carry a pair id, grouped into read pairs.
    pub fn read_pairs(&self, track: &Track, request: &IntervalRequest) -> Result<Vec<ReadPairGroup>> {
        let chromosome = self.chromosome(request)?;
        let with_diffs = *request.needs_diffs_and_gaps();
        let mut window = self.window(request, &chromosome, with_diffs)?;

        let mut candidates = Vec::new();
        self.stream(track, request, &chromosome, |record| {
            let Some(id) = *record.pair_id() else {
                return Ok(());
            };
            let mapping = self.mapping(*track.id(), &record, with_diffs.then_some(&mut window))?;
            candidates.push(PairCandidate {
                id,
                mapping,
                mate: *record.mate(),
                pair_type: *record.pair_type(),
            });
            Ok(())
        })?;

        Ok(bundle(*track.id(), candidates, &self.pairing))
    }

    fn mapping(
        &self,
        track: usize,
        record: &RawAlignment,
        window: Option<&mut RefWindow>,
    ) -> Result<Mapping, DecodeError> {
        let span: Span = record.span()?;
        let mapping = Mapping::new(track, span, record.strand())
            .with_classification(*record.classification())
            .with_num_mappings_for_read(record.loci_count().unwrap_or(1))
            .with_trimmed(*record.trimmed());

        Ok(match window {
            Some(window) => {
                let found = reconstruct(record, window)?;
                mapping.with_differences(found.count, found.diffs, found.gaps)
            }
            None => mapping.with_differences(count_without_reference(record), Vec::new(), Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use readscope_core_rs::loc::Strand;
    use readscope_core_rs::reference::InMemoryReference;
    use readscope_io_rs::alignment::cigar::parse;
    use readscope_io_rs::alignment::{Classification, LogObserver, MateInfo, VecSource};

    use super::*;
    use crate::coverage::{ArraySelection, Layer};
    use crate::request::{ReadClassFilter, Requester};
    use crate::result::Delivery;

    struct Sink;

    impl Requester for Sink {
        fn receive_data(&self, _: Delivery) {}
        fn notify_skipped(&self) {}
    }

    #[derive(Default)]
    struct Errors(std::sync::Mutex<Vec<String>>);

    impl Observer for Errors {
        fn on_decode_error(&self, _: usize, error: &DecodeError) {
            self.0.lock().unwrap().push(error.to_string());
        }
    }

    fn record(name: &str, start: Pos, ops: &str, seq: &str) -> RawAlignment {
        RawAlignment::mapped(name, start, parse(ops).unwrap(), seq).unwrap()
    }

    fn request(kind: DataKind, filter: ReadClassFilter, diffs: bool) -> IntervalRequest {
        IntervalRequest::builder(0, Arc::new(Sink))
            .window(1, 16)
            .kind(kind)
            .filter(filter)
            .diffs_and_gaps(diffs)
            .build()
            .unwrap()
    }

    fn fixture() -> (InMemoryReference, Track) {
        let reference = InMemoryReference::new()
            .with("chr1", "ACGTACGTACGTACGT")
            .unwrap();
        let mut source = VecSource::new();
        source.push(
            "chr1",
            record("perfect", 1, "8M", "ACGTACGT").with_classification(Some(Classification::Perfect)),
        );
        source.push(
            "chr1",
            record("mismatch", 1, "8M", "ACGAACGT")
                .with_classification(Some(Classification::BestMatch))
                .with_reverse(true),
        );
        source.push(
            "chr1",
            record("common", 5, "4M", "ACGT").with_loci_count(Some(3)),
        );
        source.push_broken("chr1", "damaged");
        let track = Track::new(0, "test", Arc::new(source.into_connector()));
        (reference, track)
    }

    #[test]
    fn test_coverage_and_diffs() -> Result<()> {
        let (reference, track) = fixture();
        let errors = Errors::default();
        let decoder = Decoder::new(&reference, &errors, PairingConfig::default());

        let request = request(DataKind::Coverage, ReadClassFilter::all(), true);
        let mut acc = CoverageAccumulator::new(request.total_span());
        let mut tally = DiffTally::default();
        decoder.coverage(&track, Slot::Tiers, &request, &mut acc, Some(&mut tally))?;

        let fwd = |layer| ArraySelection::new(layer, Strand::Forward);
        assert_eq!(acc.get(fwd(Layer::Perfect), 8), 1);
        assert_eq!(acc.get(fwd(Layer::Perfect), 9), 0);
        assert_eq!(acc.get(ArraySelection::new(Layer::BestMatch, Strand::Reverse), 4), 1);
        assert_eq!(acc.get(fwd(Layer::Common), 5), 1);
        assert_eq!(errors.0.lock().unwrap().len(), 1);

        let (diffs, gaps) = tally.finish();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].layer, Layer::BestMatch);
        assert_eq!(diffs[0].item.position, 4);
        // Complemented for the reverse strand record
        assert_eq!(diffs[0].item.base, b'T');
        assert!(gaps.is_empty());
        Ok(())
    }

    #[test]
    fn test_read_starts_and_filters() -> Result<()> {
        let (reference, track) = fixture();
        let decoder = Decoder::new(&reference, &LogObserver, PairingConfig::default());

        let filter = ReadClassFilter::all().with_only_unique_reads(true);
        let request = request(DataKind::ReadStarts, filter, false);
        let mut acc = CoverageAccumulator::new(request.total_span());
        decoder.coverage(&track, Slot::Tiers, &request, &mut acc, None)?;

        assert_eq!(acc.get(ArraySelection::new(Layer::Perfect, Strand::Forward), 1), 1);
        assert_eq!(acc.get(ArraySelection::new(Layer::BestMatch, Strand::Reverse), 8), 1);
        assert_eq!(acc.layer(Layer::Common), None);
        Ok(())
    }

    #[test]
    fn test_mappings() -> Result<()> {
        let (reference, track) = fixture();
        let decoder = Decoder::new(&reference, &LogObserver, PairingConfig::default());

        let mappings = decoder.mappings(&track, &request(DataKind::Mappings, ReadClassFilter::all(), true))?;
        assert_eq!(mappings.len(), 3);
        let mismatch = &mappings[1];
        assert_eq!(*mismatch.num_differences(), 1);
        assert!(*mismatch.is_best_mapping());
        assert_eq!(mismatch.diffs().len(), 1);
        assert_eq!(*mappings[2].num_mappings_for_read(), 3);

        let reduced = decoder.mappings(
            &track,
            &request(DataKind::ReducedMappings, ReadClassFilter::all(), true),
        )?;
        // Same placement but different strands
        assert_eq!(reduced.len(), 3);
        assert!(reduced.iter().all(|m| m.diffs().is_empty()));
        Ok(())
    }

    #[test]
    fn test_reduced_mappings_collapse_replicates() -> Result<()> {
        let reference = InMemoryReference::new().with("chr1", "ACGTACGTACGTACGT")?;
        let source = VecSource::new()
            .with("chr1", record("a", 3, "4M", "GTAC"))
            .with("chr1", record("b", 3, "4M", "GTAC"))
            .with("chr1", record("c", 3, "4M", "GTAA"));
        let track = Track::new(0, "test", Arc::new(source.into_connector()));
        let decoder = Decoder::new(&reference, &LogObserver, PairingConfig::default());

        let reduced = decoder.mappings(
            &track,
            &request(DataKind::ReducedMappings, ReadClassFilter::all(), false),
        )?;
        assert_eq!(reduced.len(), 1);
        assert_eq!(*reduced[0].num_replicates(), 3);
        Ok(())
    }

    #[test]
    fn test_read_pairs() -> Result<()> {
        let reference = InMemoryReference::new().with("chr1", "ACGTACGTACGTACGT")?;
        let mate = |is_first, start| {
            Some(MateInfo {
                is_first,
                is_last: !is_first,
                start: Some(start),
                is_reverse: is_first,
            })
        };
        let source = VecSource::new()
            .with(
                "chr1",
                record("p", 1, "4M", "ACGT").with_mate(mate(true, 9)).with_pair(Some(1), None),
            )
            .with(
                "chr1",
                record("p", 9, "4M", "ACGT")
                    .with_reverse(true)
                    .with_mate(mate(false, 1))
                    .with_pair(Some(1), None),
            )
            .with("chr1", record("lonely", 5, "4M", "ACGT"));
        let track = Track::new(0, "test", Arc::new(source.into_connector()));
        let decoder = Decoder::new(&reference, &LogObserver, PairingConfig::new(12, 10)?);

        let groups = decoder.read_pairs(&track, &request(DataKind::ReadPairs, ReadClassFilter::all(), false))?;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].pairs().len(), 1);
        assert_eq!(*groups[0].pairs()[0].pair_type(), PairType::Perfect);
        Ok(())
    }

    #[test]
    fn test_padded_record_is_kept() -> Result<()> {
        let reference = InMemoryReference::new().with("chr1", "ACGTACGTACGTACGT")?;
        let source = VecSource::new().with("chr1", record("padded", 1, "2M1P2M", "ACGT"));
        let track = Track::new(0, "test", Arc::new(source.into_connector()));
        let errors = Errors::default();
        let decoder = Decoder::new(&reference, &errors, PairingConfig::default());

        let mappings = decoder.mappings(&track, &request(DataKind::Mappings, ReadClassFilter::all(), true))?;
        assert_eq!(mappings.len(), 1);
        assert_eq!((*mappings[0].start(), *mappings[0].stop()), (1, 5));
        assert_eq!(*mappings[0].num_differences(), 2);

        let request = request(DataKind::Coverage, ReadClassFilter::all(), true);
        let mut acc = CoverageAccumulator::new(request.total_span());
        decoder.coverage(&track, Slot::Tiers, &request, &mut acc, Some(&mut DiffTally::default()))?;
        assert_eq!(acc.get(ArraySelection::new(Layer::Common, Strand::Forward), 5), 1);
        assert!(errors.0.lock().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn test_unknown_chromosome() {
        let (reference, track) = fixture();
        let decoder = Decoder::new(&reference, &LogObserver, PairingConfig::default());
        let request = IntervalRequest::builder(5, Arc::new(Sink))
            .window(1, 10)
            .kind(DataKind::Mappings)
            .build()
            .unwrap();
        assert!(decoder.mappings(&track, &request).is_err());
    }
}
