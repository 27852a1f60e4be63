use std::path::Path;
use std::sync::Arc;

use eyre::Result;
use impl_tools::autoimpl;

use readscope_core_rs::loc::Span;

use super::error::DecodeError;
use super::record::RawAlignment;

/// Stream of decoded records. Every item is either a record or the reason it couldn't be read.
pub type Records<'a> = Box<dyn 'a + Iterator<Item = Result<RawAlignment, DecodeError>>>;

/// An opened alignment file (or any other alignment store) of a single track.
pub trait AlignmentSource: Send {
    /// Fetch records overlapping the closed span of the named contig. Contigs unknown to the
    /// source yield an empty stream.
    fn fetch<'a>(&'a mut self, contig: &str, span: Span) -> Result<Records<'a>>;
}

/// Knows where a track's alignments live and how to open them. The source is opened for each
/// query and dropped right after, so handles are never shared between concurrent decodes.
#[autoimpl(for<T: trait + ?Sized> &T, Box<T>, Arc<T>)]
pub trait Connector: Send + Sync {
    fn open(&self, observer: &dyn Observer) -> Result<Box<dyn AlignmentSource>>;

    /// Human-readable description used in logs.
    fn describe(&self) -> String;
}

/// Push notifications about problems that don't interrupt a query.
#[autoimpl(for<T: trait + ?Sized> &T, Box<T>, Arc<T>)]
pub trait Observer: Send + Sync {
    /// A record of the given track was skipped because it couldn't be decoded.
    fn on_decode_error(&self, track: usize, error: &DecodeError);

    /// A missing alignment index is being rebuilt (`finished == false`) or was rebuilt.
    fn on_index_rebuild(&self, path: &Path, finished: bool) {
        let _ = (path, finished);
    }
}

/// Observer that forwards everything to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_decode_error(&self, track: usize, error: &DecodeError) {
        log::warn!("Skipped an alignment record of track {track}: {error}");
    }

    fn on_index_rebuild(&self, path: &Path, finished: bool) {
        if finished {
            log::info!("Alignment index rebuilt for {}", path.display());
        } else {
            log::info!(
                "Alignment index is missing, rebuilding it for {}",
                path.display()
            );
        }
    }
}
