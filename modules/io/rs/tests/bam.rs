use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use eyre::{eyre, Result};
use noodles::bam;
use noodles::core::Position;
use noodles::sam;
use noodles::sam::alignment::io::Write as _;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::{Cigar, Data, Sequence};
use noodles::sam::alignment::RecordBuf;

use readscope_core_rs::loc::Span;
use readscope_io_rs::alignment::cigar::parse;
use readscope_io_rs::alignment::{
    AlignmentSource, Classification, Connector, DecodeError, MateInfo, Observer, RawAlignment,
};
use readscope_io_rs::bam::{ConnectorBuilder, IndexCache};

#[derive(Default)]
struct Recorder {
    rebuilds: Mutex<Vec<(PathBuf, bool)>>,
    errors: Mutex<Vec<String>>,
}

impl Observer for Recorder {
    fn on_decode_error(&self, _: usize, error: &DecodeError) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_index_rebuild(&self, path: &Path, finished: bool) {
        self.rebuilds
            .lock()
            .unwrap()
            .push((path.to_path_buf(), finished));
    }
}

fn workdir(name: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("readscope-io-{}-{name}", std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn tags(values: &[(&[u8; 2], i32)]) -> Data {
    values
        .iter()
        .map(|(tag, value)| (Tag::from(**tag), Value::from(*value)))
        .collect()
}

fn record(
    name: &str,
    flags: Flags,
    start: usize,
    cigar: Vec<Op>,
    mate_start: Option<usize>,
    data: Data,
) -> Result<RecordBuf> {
    let mut builder = RecordBuf::builder()
        .set_name(name)
        .set_flags(flags)
        .set_reference_sequence_id(0)
        .set_alignment_start(Position::try_from(start)?)
        .set_mapping_quality(MappingQuality::new(30).ok_or_else(|| eyre!("Invalid MAPQ"))?)
        .set_cigar(Cigar::from(cigar))
        .set_sequence(Sequence::from(b"ACGT".to_vec()))
        .set_data(data);
    if let Some(mate_start) = mate_start {
        builder = builder
            .set_mate_reference_sequence_id(0)
            .set_mate_alignment_start(Position::try_from(mate_start)?);
    }
    Ok(builder.build())
}

/// Coordinate-sorted BAM without an index: a read pair, a duplicate and a padded record.
fn write_bam(path: &Path) -> Result<()> {
    let header: sam::Header = "@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:1000\n".parse()?;
    let matched = || vec![Op::new(Kind::Match, 4)];

    let records = [
        record(
            "pair",
            Flags::SEGMENTED | Flags::FIRST_SEGMENT | Flags::MATE_REVERSE_COMPLEMENTED,
            10,
            matched(),
            Some(40),
            tags(&[
                (b"Yc", 3),
                (b"NH", 2),
                (b"Yi", 7),
                (b"Ys", 0),
                (b"Tl", 2),
                (b"Tr", 1),
            ]),
        )?,
        record("dup", Flags::DUPLICATE, 20, matched(), None, Data::default())?,
        record(
            "padded",
            Flags::empty(),
            30,
            vec![
                Op::new(Kind::Match, 2),
                Op::new(Kind::Pad, 1),
                Op::new(Kind::Match, 2),
            ],
            None,
            tags(&[(b"Yc", 1)]),
        )?,
        record(
            "pair",
            Flags::SEGMENTED | Flags::LAST_SEGMENT | Flags::REVERSE_COMPLEMENTED,
            40,
            matched(),
            Some(10),
            tags(&[(b"Yi", 7), (b"Ys", 0)]),
        )?,
    ];

    let mut writer = bam::io::Writer::new(File::create(path)?);
    writer.write_header(&header)?;
    for record in &records {
        writer.write_alignment_record(&header, record)?;
    }
    writer.try_finish()?;
    Ok(())
}

fn fetch(connector: &dyn Connector, observer: &dyn Observer, span: Span) -> Result<Vec<RawAlignment>> {
    let mut source = connector.open(observer)?;
    let records = source
        .fetch("chr1", span)?
        .collect::<Result<Vec<_>, DecodeError>>()?;
    Ok(records)
}

#[test]
fn missing_index_is_rebuilt_once() -> Result<()> {
    let dir = workdir("rebuild")?;
    let path = dir.join("reads.bam");
    write_bam(&path)?;

    let cache = IndexCache::shared();
    let observer = Recorder::default();
    let connector = ConnectorBuilder::new(&path)
        .with_index_cache(cache.clone())
        .build();

    let records = fetch(&connector, &observer, Span::new(1, 100)?)?;
    assert_eq!(records.len(), 3);
    assert_eq!(
        *observer.rebuilds.lock().unwrap(),
        vec![(path.clone(), false), (path.clone(), true)]
    );
    assert!(IndexCache::index_path(&path).exists());
    assert_eq!(cache.len(), 1);

    // Served from the cache afterwards
    fetch(&connector, &observer, Span::new(1, 100)?)?;
    assert_eq!(observer.rebuilds.lock().unwrap().len(), 2);

    // A fresh cache reads the persisted index instead of rebuilding it
    let connector = ConnectorBuilder::new(&path).build();
    fetch(&connector, &observer, Span::new(1, 100)?)?;
    assert_eq!(observer.rebuilds.lock().unwrap().len(), 2);
    assert!(observer.errors.lock().unwrap().is_empty());

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn attributes_are_decoded() -> Result<()> {
    let dir = workdir("attributes")?;
    let path = dir.join("reads.bam");
    write_bam(&path)?;

    let observer = Recorder::default();
    let connector = ConnectorBuilder::new(&path).build();
    let records = fetch(&connector, &observer, Span::new(1, 100)?)?;
    let names: Vec<_> = records.iter().map(|x| x.name().as_str()).collect();
    assert_eq!(names, vec!["pair", "padded", "pair"]);

    let first = &records[0];
    assert_eq!((*first.start(), *first.stop()), (10, 13));
    assert!(!*first.is_reverse());
    assert_eq!(*first.mapping_quality(), Some(30));
    assert_eq!(*first.classification(), Some(Classification::Perfect));
    assert_eq!(*first.loci_count(), Some(2));
    assert_eq!(*first.pair_id(), Some(7));
    assert_eq!(*first.pair_type(), Some(0));
    assert_eq!(*first.trimmed(), Some((2, 1)));
    assert_eq!(
        *first.mate(),
        Some(MateInfo {
            is_first: true,
            is_last: false,
            start: Some(40),
            is_reverse: true,
        })
    );
    assert_eq!(first.sequence().as_slice(), b"ACGT");

    // The stop counts the padding run
    let padded = &records[1];
    assert_eq!(*padded.cigar(), parse("2M1P2M")?);
    assert_eq!((*padded.start(), *padded.stop()), (30, 34));
    assert_eq!(*padded.classification(), Some(Classification::Common));
    assert_eq!(*padded.loci_count(), None);
    assert_eq!(*padded.mate(), None);
    assert_eq!(*padded.trimmed(), None);

    let last = &records[2];
    assert!(*last.is_reverse());
    assert_eq!(last.mate().and_then(|x| x.start), Some(10));
    assert_eq!(last.mate().map(|x| x.is_last), Some(true));

    // Only the padding overlaps position 34
    let tail = fetch(&connector, &observer, Span::new(34, 35)?)?;
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].name(), "padded");

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn flag_masks_select_records() -> Result<()> {
    let dir = workdir("flags")?;
    let path = dir.join("reads.bam");
    write_bam(&path)?;
    let observer = Recorder::default();
    let cache = IndexCache::shared();

    let everything = ConnectorBuilder::new(&path)
        .with_index_cache(cache.clone())
        .with_exflags(0)
        .build();
    assert_eq!(fetch(&everything, &observer, Span::new(1, 100)?)?.len(), 4);

    // Only the first mate
    let first = ConnectorBuilder::new(&path)
        .with_index_cache(cache)
        .with_inflags(0x40)
        .build();
    let records = fetch(&first, &observer, Span::new(1, 100)?)?;
    assert_eq!(records.len(), 1);
    assert_eq!(*records[0].start(), 10);

    assert!(fetch(&everything, &observer, Span::new(500, 600)?)?.is_empty());
    let mut source = everything.open(&observer)?;
    assert_eq!(source.fetch("chrX", Span::new(1, 100)?)?.count(), 0);

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
