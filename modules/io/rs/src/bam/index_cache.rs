use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use ahash::AHashMap;
use eyre::{eyre, Context, Result};
use noodles::{bam, sam};

use crate::alignment::Observer;

/// Parsed header and index of one BAM file.
#[derive(Clone)]
pub struct IndexedHeader {
    pub header: Arc<sam::Header>,
    pub index: Arc<bam::bai::Index>,
}

#[derive(Clone)]
struct Entry {
    // Modification time of the BAM file the entry was built from
    version: Option<SystemTime>,
    data: IndexedHeader,
}

/// Shared cache of BAM headers and indices keyed by file path (family) and modification time
/// (version). Constructed once and handed to every connector that needs it.
#[derive(Default)]
pub struct IndexCache {
    entries: Mutex<AHashMap<PathBuf, Entry>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Path of the BAI index that belongs to the BAM file.
    pub fn index_path(path: &Path) -> PathBuf {
        let mut index = OsString::from(path);
        index.push(".bai");
        PathBuf::from(index)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|x| x.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invalidate(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(path);
        }
    }

    /// Header and index of the file. A stale or absent entry is (re)loaded; a missing index is
    /// rebuilt before returning, which blocks the calling thread.
    pub fn get_or_load(&self, path: &Path, observer: &dyn Observer) -> Result<IndexedHeader> {
        let version = std::fs::metadata(path)
            .and_then(|x| x.modified())
            .ok();

        {
            let entries = self
                .entries
                .lock()
                .map_err(|_| eyre!("BAM index cache lock is poisoned"))?;
            if let Some(entry) = entries.get(path) {
                if entry.version == version {
                    return Ok(entry.data.clone());
                }
            }
        }

        // The lock isn't held while loading, other tracks may proceed meanwhile
        let data = Self::load(path, observer)?;
        self.entries
            .lock()
            .map_err(|_| eyre!("BAM index cache lock is poisoned"))?
            .insert(
                path.to_path_buf(),
                Entry {
                    version,
                    data: data.clone(),
                },
            );
        Ok(data)
    }

    fn load(path: &Path, observer: &dyn Observer) -> Result<IndexedHeader> {
        let mut reader = File::open(path)
            .map(bam::io::Reader::new)
            .wrap_err_with(|| format!("Failed to open BAM file: {}", path.display()))?;
        let header = reader
            .read_header()
            .wrap_err_with(|| format!("Failed to read BAM header: {}", path.display()))?;

        let index_path = Self::index_path(path);
        let index = if index_path.exists() {
            bam::bai::fs::read(&index_path)
                .wrap_err_with(|| format!("Failed to read BAM index: {}", index_path.display()))?
        } else {
            observer.on_index_rebuild(path, false);
            let index = bam::fs::index(path)
                .wrap_err_with(|| format!("Failed to index BAM file: {}", path.display()))?;
            // The index is still usable for this session even if it can't be persisted
            if let Err(err) = bam::bai::fs::write(&index_path, &index) {
                log::warn!(
                    "Failed to save the rebuilt index to {}: {err}",
                    index_path.display()
                );
            }
            observer.on_index_rebuild(path, true);
            index
        };

        Ok(IndexedHeader {
            header: Arc::new(header),
            index: Arc::new(index),
        })
    }
}
