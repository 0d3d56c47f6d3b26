use std::cmp::Ordering;

use arrow::array::ArrayRef;
use colbatch_result::Result;

use super::{HashStrategy, HashStrategyOptions, StrategyChannels};
use crate::batch_builder::BatchBuilder;
use crate::types::{ValueKind, combine_hash};

/// Hash strategy that dispatches on [`ValueKind`] for every key value.
///
/// Supports every kind, and is the only strategy for lookups without join
/// keys.
#[derive(Debug)]
pub struct InterpretedHashStrategy {
    channels: StrategyChannels,
    key_kinds: Vec<ValueKind>,
}

impl InterpretedHashStrategy {
    pub fn try_new(
        kinds: Vec<ValueKind>,
        channels: Vec<Vec<ArrayRef>>,
        options: &HashStrategyOptions,
    ) -> Result<Self> {
        let channels = StrategyChannels::try_new(kinds, channels, options)?;
        let key_kinds = channels.key_kinds();
        Ok(Self {
            channels,
            key_kinds,
        })
    }

    fn keys_match(
        &self,
        left_batch: usize,
        left_position: usize,
        right_position: usize,
        right_keys: &[ArrayRef],
        nulls_match: bool,
    ) -> bool {
        self.channels
            .join_channels
            .iter()
            .zip(&self.key_kinds)
            .zip(right_keys)
            .all(|((&channel, kind), right)| {
                let left = self.channels.array(channel, left_batch);
                match (left.is_null(left_position), right.is_null(right_position)) {
                    (true, true) => nulls_match,
                    (false, false) => kind.equal(left, left_position, right.as_ref(), right_position),
                    _ => false,
                }
            })
    }

    fn positions_match(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
        nulls_match: bool,
    ) -> bool {
        self.channels
            .join_channels
            .iter()
            .zip(&self.key_kinds)
            .all(|(&channel, kind)| {
                let left = self.channels.array(channel, left_batch);
                let right = self.channels.array(channel, right_batch);
                match (left.is_null(left_position), right.is_null(right_position)) {
                    (true, true) => nulls_match,
                    (false, false) => kind.equal(left, left_position, right, right_position),
                    _ => false,
                }
            })
    }
}

impl HashStrategy for InterpretedHashStrategy {
    fn channel_count(&self) -> usize {
        self.channels.output_channels.len()
    }

    fn size_in_bytes(&self) -> usize {
        self.channels.size_in_bytes() + self.key_kinds.capacity() * size_of::<ValueKind>()
    }

    fn append_to(
        &self,
        batch: usize,
        position: usize,
        builder: &mut BatchBuilder,
        output_channel_offset: usize,
    ) -> Result<()> {
        self.channels
            .append_to(batch, position, builder, output_channel_offset)
    }

    fn hash_position(&self, batch: usize, position: usize) -> u64 {
        if let Some(hash) = self.channels.precomputed_hash(batch, position) {
            return hash;
        }
        self.channels
            .join_channels
            .iter()
            .zip(&self.key_kinds)
            .fold(0, |hash, (&channel, kind)| {
                let array = self.channels.array(channel, batch);
                let value_hash = if array.is_null(position) {
                    0
                } else {
                    ValueKind::hash(*kind, array, position)
                };
                combine_hash(hash, value_hash)
            })
    }

    fn hash_row(&self, position: usize, probe_keys: &[ArrayRef]) -> u64 {
        self.key_kinds
            .iter()
            .zip(probe_keys)
            .fold(0, |hash, (kind, array)| {
                let value_hash = if array.is_null(position) {
                    0
                } else {
                    ValueKind::hash(*kind, array.as_ref(), position)
                };
                combine_hash(hash, value_hash)
            })
    }

    fn position_equals_row(
        &self,
        left_batch: usize,
        left_position: usize,
        right_position: usize,
        right_keys: &[ArrayRef],
    ) -> bool {
        self.keys_match(left_batch, left_position, right_position, right_keys, false)
    }

    fn position_not_distinct_from_row(
        &self,
        left_batch: usize,
        left_position: usize,
        right_position: usize,
        right_keys: &[ArrayRef],
    ) -> bool {
        self.keys_match(left_batch, left_position, right_position, right_keys, true)
    }

    fn position_equals_position(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> bool {
        self.positions_match(left_batch, left_position, right_batch, right_position, false)
    }

    fn position_not_distinct_from_position(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> bool {
        self.positions_match(left_batch, left_position, right_batch, right_position, true)
    }

    fn is_position_null(&self, batch: usize, position: usize) -> bool {
        self.channels
            .join_channels
            .iter()
            .any(|&channel| self.channels.array(channel, batch).is_null(position))
    }

    fn compare_sort_channel_positions(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> Ordering {
        self.channels
            .compare_sort(left_batch, left_position, right_batch, right_position)
    }

    fn is_sort_channel_position_null(&self, batch: usize, position: usize) -> bool {
        self.channels.is_sort_null(batch, position)
    }
}
