use std::fs::File;

use noodles::{bam, bgzf, csi, csi::binning_index::index::reference_sequence::bin::Chunk};

use readscope_core_rs::loc::Span;

use crate::alignment::{DecodeError, RawAlignment};

use super::convert::convert;

/// Records of a single indexed region. Chunks returned by the index may include records that
/// don't overlap the region, those are filtered out here.
pub struct Query<'a> {
    reader: bam::io::Reader<csi::io::Query<'a, bgzf::io::Reader<File>>>,
    reference_sequence_id: usize,
    span: Span,
    record: bam::Record,
    inflags: u16,
    exflags: u16,
    exhausted: bool,
}

impl<'a> Query<'a> {
    pub fn new(
        reader: &'a mut bgzf::io::Reader<File>,
        chunks: Vec<Chunk>,
        reference_sequence_id: usize,
        span: Span,
        inflags: u16,
        exflags: u16,
    ) -> Self {
        Self {
            reader: bam::io::Reader::from(csi::io::Query::new(reader, chunks)),
            reference_sequence_id,
            span,
            record: bam::Record::default(),
            inflags,
            exflags,
            exhausted: false,
        }
    }

    /// Converted record if it passes the flag masks and overlaps the span. The overlap is
    /// checked on the converted stop, which counts padding.
    fn accept(&self) -> Result<Option<RawAlignment>, DecodeError> {
        let flags: u16 = self.record.flags().into();
        if flags & self.inflags != self.inflags || flags & self.exflags != 0 {
            return Ok(None);
        }
        if self.record.reference_sequence_id().transpose()? != Some(self.reference_sequence_id) {
            return Ok(None);
        }

        let record = convert(&self.record)?;
        if *record.is_unmapped() || !record.span()?.intersects(&self.span) {
            return Ok(None);
        }
        Ok(Some(record))
    }
}

impl Iterator for Query<'_> {
    type Item = Result<RawAlignment, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            match self.reader.read_record(&mut self.record) {
                Ok(0) => self.exhausted = true,
                Ok(_) => match self.accept() {
                    Ok(Some(record)) => return Some(Ok(record)),
                    Ok(None) => continue,
                    Err(err) => return Some(Err(err)),
                },
                Err(err) => {
                    // The stream position is unreliable after a failed read
                    self.exhausted = true;
                    return Some(Err(err.into()));
                }
            }
        }
        None
    }
}
