use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use derive_getters::Getters;
use eyre::{Context, Result};
use noodles::core::position::Position;
use noodles::core::region::Interval;
use noodles::csi::BinningIndex;
use noodles::{bam, bgzf};

use readscope_core_rs::loc::Span;

use crate::alignment::{AlignmentSource, Connector, Observer, Records};

use super::index_cache::{IndexCache, IndexedHeader};
use super::query::Query;

/// Opened, indexed BAM file of one track.
pub struct Reader {
    path: PathBuf,
    inner: bam::io::Reader<bgzf::io::Reader<File>>,
    indexed: IndexedHeader,
    inflags: u16,
    exflags: u16,
}

impl Reader {
    pub fn open(
        path: &Path,
        cache: &IndexCache,
        observer: &dyn Observer,
        inflags: u16,
        exflags: u16,
    ) -> Result<Self> {
        let indexed = cache.get_or_load(path, observer)?;

        let mut inner = File::open(path)
            .map(bam::io::Reader::new)
            .wrap_err_with(|| format!("Failed to open BAM file: {}", path.display()))?;
        // Position the stream past the header, the parsed copy lives in the cache
        inner.read_header()?;

        Ok(Self {
            path: path.to_path_buf(),
            inner,
            indexed,
            inflags,
            exflags,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlignmentSource for Reader {
    fn fetch<'a>(&'a mut self, contig: &str, span: Span) -> Result<Records<'a>> {
        let Some(reference_sequence_id) = self
            .indexed
            .header
            .reference_sequences()
            .get_index_of(contig.as_bytes())
        else {
            log::debug!("{} has no reads on {contig}", self.path.display());
            return Ok(Box::new(std::iter::empty()));
        };

        let start = Position::try_from(span.start().max(1) as usize)?;
        let end = Position::try_from(span.stop().max(1) as usize)?;
        let interval = Interval::from(start..=end);

        let chunks = self.indexed.index.query(reference_sequence_id, interval)?;
        Ok(Box::new(Query::new(
            self.inner.get_mut(),
            chunks,
            reference_sequence_id,
            span,
            self.inflags,
            self.exflags,
        )))
    }
}

/// Connector for tracks backed by an indexed BAM file.
#[derive(Clone, Getters)]
pub struct BamConnector {
    path: PathBuf,
    #[getter(skip)]
    cache: Arc<IndexCache>,
    inflags: u16,
    exflags: u16,
}

impl BamConnector {
    pub(super) fn new(path: PathBuf, cache: Arc<IndexCache>, inflags: u16, exflags: u16) -> Self {
        Self {
            path,
            cache,
            inflags,
            exflags,
        }
    }
}

impl Connector for BamConnector {
    fn open(&self, observer: &dyn Observer) -> Result<Box<dyn AlignmentSource>> {
        Ok(Box::new(Reader::open(
            &self.path,
            &self.cache,
            observer,
            self.inflags,
            self.exflags,
        )?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
