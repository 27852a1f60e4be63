use eyre::Result;

use readscope_core_rs::loc::{Pos, Span};
use readscope_core_rs::reference::Reference;
use readscope_io_rs::alignment::DecodeError;

/// Lazily fetched reference bases of one chromosome. The window grows to the union of every
/// span asked for, extended by at least [`RefWindow::GROWTH`] bases in the direction it grows, so
/// records sticking out of the query interval don't trigger a fetch each.
pub struct RefWindow<'a> {
    reference: &'a dyn Reference,
    chromosome: usize,
    limits: Span,
    loaded: Option<(Span, Vec<u8>)>,
}

impl<'a> RefWindow<'a> {
    pub const GROWTH: Pos = 4096;

    pub fn new(reference: &'a dyn Reference, chromosome: usize, limits: Span) -> Self {
        Self {
            reference,
            chromosome,
            limits,
            loaded: None,
        }
    }

    fn ensure(&mut self, span: Span) -> Result<Span, DecodeError> {
        let wanted = span.clipped(&self.limits).ok_or_else(|| {
            DecodeError::Reference(format!(
                "alignment {span} lies outside of the chromosome {}",
                self.limits
            ))
        })?;
        if let Some((loaded, _)) = &self.loaded {
            if loaded.covers(&wanted) {
                return Ok(*loaded);
            }
        }

        let target = match &self.loaded {
            Some((loaded, _)) => {
                let start = if wanted.start() < loaded.start() {
                    wanted.start().min(loaded.start() - Self::GROWTH)
                } else {
                    loaded.start()
                };
                let stop = if wanted.stop() > loaded.stop() {
                    wanted.stop().max(loaded.stop() + Self::GROWTH)
                } else {
                    loaded.stop()
                };
                Span::new(start.max(self.limits.start()), stop.min(self.limits.stop()))
                    .map_err(|e| DecodeError::Reference(e.to_string()))?
            }
            None => wanted,
        };
        let bases = self
            .reference
            .sequence(self.chromosome, target.start(), target.stop())
            .map_err(|e| DecodeError::Reference(e.to_string()))?;
        self.loaded = Some((target, bases));
        Ok(target)
    }

    /// Preload a span, usually the whole query interval. Spans outside of the chromosome are
    /// ignored.
    pub fn preload(&mut self, span: Span) -> Result<(), DecodeError> {
        match span.clipped(&self.limits) {
            Some(span) => self.ensure(span).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Reference bases of the span. Parts beyond the chromosome end are not returned, so the
    /// slice may be shorter than the span.
    pub fn bases(&mut self, span: Span) -> Result<(Pos, &[u8]), DecodeError> {
        let loaded = self.ensure(span)?;
        let from = span.start().max(loaded.start());
        let to = span.stop().min(loaded.stop());
        let bases = match &self.loaded {
            Some((_, bases)) => bases.as_slice(),
            None => &[],
        };
        let (lo, hi) = (loaded.offset(from), loaded.offset(to) + 1);
        Ok((from, &bases[lo..hi.min(bases.len())]))
    }
}
