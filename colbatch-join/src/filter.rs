use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::record_batch::RecordBatch;

/// Build-side row handed to a [`JoinFilterFunction`].
#[derive(Clone, Copy)]
pub struct BuildRow<'a> {
    channels: &'a [Vec<ArrayRef>],
    batch: usize,
    position: usize,
}

impl<'a> BuildRow<'a> {
    pub(crate) fn new(channels: &'a [Vec<ArrayRef>], batch: usize, position: usize) -> Self {
        Self {
            channels,
            batch,
            position,
        }
    }

    /// Retained array of `channel` holding this row. Panics when `channel`
    /// is out of range.
    pub fn array(&self, channel: usize) -> &'a dyn Array {
        self.channels[channel][self.batch].as_ref()
    }

    /// Offset of the row inside [`BuildRow::array`].
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_null(&self, channel: usize) -> bool {
        self.array(channel).is_null(self.position)
    }
}

impl fmt::Debug for BuildRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRow")
            .field("batch", &self.batch)
            .field("position", &self.position)
            .finish()
    }
}

/// Residual join predicate evaluated on a build row and a probe row.
///
/// Implemented for every `Fn(BuildRow<'_>, usize, &RecordBatch) -> bool`
/// closure that is `Send + Sync`.
pub trait JoinFilterFunction: Send + Sync {
    fn filter(&self, build: BuildRow<'_>, probe_position: usize, probe: &RecordBatch) -> bool;
}

impl<F> JoinFilterFunction for F
where
    F: Fn(BuildRow<'_>, usize, &RecordBatch) -> bool + Send + Sync,
{
    fn filter(&self, build: BuildRow<'_>, probe_position: usize, probe: &RecordBatch) -> bool {
        self(build, probe_position, probe)
    }
}

pub type JoinFilterRef = Arc<dyn JoinFilterFunction>;
