use std::path::PathBuf;
use std::sync::Arc;

use super::index_cache::IndexCache;
use super::reader::BamConnector;

#[derive(Clone)]
pub struct ConnectorBuilder {
    filename: PathBuf,
    cache: Option<Arc<IndexCache>>,
    inflags: Option<u16>,
    exflags: Option<u16>,
}

impl ConnectorBuilder {
    /// Secondary alignments, QC failures and duplicates are excluded unless told otherwise.
    pub const DEFAULT_EXFLAGS: u16 = 0x100 | 0x200 | 0x400;

    pub fn new<T: Into<PathBuf>>(filename: T) -> Self {
        Self {
            filename: filename.into(),
            cache: None,
            inflags: None,
            exflags: None,
        }
    }

    /// Share parsed headers and indices with other connectors.
    pub fn with_index_cache(mut self, cache: Arc<IndexCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_inflags(mut self, inflags: u16) -> Self {
        self.inflags = Some(inflags);
        self
    }

    pub fn with_exflags(mut self, exflags: u16) -> Self {
        self.exflags = Some(exflags);
        self
    }

    pub fn build(self) -> BamConnector {
        BamConnector::new(
            self.filename,
            self.cache.unwrap_or_else(IndexCache::shared),
            self.inflags.unwrap_or(0),
            self.exflags.unwrap_or(Self::DEFAULT_EXFLAGS),
        )
    }
}
