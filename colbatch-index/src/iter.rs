//! Iteration over the content of a [`BatchIndex`].

use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use colbatch_result::Result;

use crate::address::decode_indices;
use crate::batch_builder::BatchBuilder;
use crate::index::BatchIndex;

/// Retained batches in insertion order. Single pass; call
/// [`BatchIndex::batches`] again to restart.
pub struct Batches<'a> {
    index: &'a BatchIndex,
    next_batch: usize,
}

impl<'a> Batches<'a> {
    pub(crate) fn new(index: &'a BatchIndex) -> Self {
        Self {
            index,
            next_batch: 0,
        }
    }
}

impl Iterator for Batches<'_> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = self.next_batch;
        let rows = *self.index.batch_position_counts().get(batch)?;
        self.next_batch += 1;
        let columns = self
            .index
            .channels()
            .iter()
            .map(|channel| channel[batch].clone())
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        Some(
            RecordBatch::try_new_with_options(self.index.schema(), columns, &options)
                .map_err(Into::into),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.index.batch_count() - self.next_batch.min(self.index.batch_count());
        (remaining, Some(remaining))
    }
}

/// Output batches holding every row in logical order.
///
/// Each batch is a snapshot copied out of the index; it stays valid after the
/// index is cleared or mutated.
pub struct SortedBatches<'a> {
    index: &'a BatchIndex,
    builder: BatchBuilder,
    next_position: usize,
}

impl<'a> SortedBatches<'a> {
    pub(crate) fn new(index: &'a BatchIndex, max_rows: usize, max_bytes: usize) -> Result<Self> {
        Ok(Self {
            builder: BatchBuilder::new(&index.schema(), max_rows, max_bytes)?,
            index,
            next_position: 0,
        })
    }

    fn fill(&mut self) -> Result<RecordBatch> {
        let index = self.index;
        let addresses = index.value_addresses();
        let channels = index.channels();
        while !self.builder.is_full() && self.next_position < addresses.len() {
            let (batch, position) = decode_indices(addresses[self.next_position]);
            for (channel, batches) in channels.iter().enumerate() {
                self.builder
                    .append(channel, batches[batch].as_ref(), position)?;
            }
            self.builder.declare_position();
            self.next_position += 1;
        }
        self.builder.build()
    }
}

impl Iterator for SortedBatches<'_> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_position >= self.index.position_count() {
            return None;
        }
        let batch = self.fill();
        if batch.is_err() {
            // Stop after the first failure.
            self.next_position = self.index.position_count();
        }
        Some(batch)
    }
}
