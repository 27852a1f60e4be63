use std::sync::Arc;

use ahash::AHashMap;
use eyre::Result;

use readscope_core_rs::loc::Span;

use super::error::DecodeError;
use super::record::RawAlignment;
use super::source::{AlignmentSource, Connector, Observer, Records};

/// Alignments kept in memory, grouped by contig. Entries may hold decode errors to emulate
/// damaged records.
#[derive(Clone, Debug, Default)]
pub struct VecSource {
    contigs: AHashMap<String, Vec<Arc<Result<RawAlignment, String>>>>,
}

impl VecSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, contig: impl Into<String>, record: RawAlignment) {
        self.contigs
            .entry(contig.into())
            .or_default()
            .push(Arc::new(Ok(record)));
    }

    /// Register a record that fails to decode with the given reason.
    pub fn push_broken(&mut self, contig: impl Into<String>, reason: impl Into<String>) {
        self.contigs
            .entry(contig.into())
            .or_default()
            .push(Arc::new(Err(reason.into())));
    }

    pub fn with(mut self, contig: impl Into<String>, record: RawAlignment) -> Self {
        self.push(contig, record);
        self
    }

    /// Wrap the records into a connector that hands out fresh copies of them.
    pub fn into_connector(self) -> VecConnector {
        VecConnector {
            source: Arc::new(self),
        }
    }
}

impl AlignmentSource for VecSource {
    fn fetch<'a>(&'a mut self, contig: &str, span: Span) -> Result<Records<'a>> {
        let Some(records) = self.contigs.get(contig) else {
            return Ok(Box::new(std::iter::empty()));
        };

        Ok(Box::new(records.iter().filter_map(move |entry| {
            match entry.as_ref() {
                Ok(record) => {
                    let overlaps = !record.is_unmapped()
                        && *record.start() <= span.stop()
                        && span.start() <= *record.stop();
                    overlaps.then(|| Ok(record.clone()))
                }
                Err(reason) => Some(Err(DecodeError::Coordinates(reason.clone()))),
            }
        })))
    }
}

#[derive(Clone, Debug)]
pub struct VecConnector {
    source: Arc<VecSource>,
}

impl Connector for VecConnector {
    fn open(&self, _: &dyn Observer) -> Result<Box<dyn AlignmentSource>> {
        Ok(Box::new((*self.source).clone()))
    }

    fn describe(&self) -> String {
        format!("in-memory alignments ({} contigs)", self.source.contigs.len())
    }
}
