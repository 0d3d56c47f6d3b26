//! Hash strategies: key hashing, key equality and output projection over the
//! retained channels of a batch index.
//!
//! There are exactly two implementations. [`CompiledHashStrategy`] is produced
//! through the [`JoinCompiler`] and works on join keys that were resolved to
//! concrete Arrow array types once per batch. [`InterpretedHashStrategy`]
//! dispatches on [`ValueKind`] for every value and supports every kind. Both
//! use the canonical row hash from [`crate::types`], so a lookup source
//! behaves identically whichever one it was built with.

mod compiled;
mod compiler;
mod interpreted;

pub use compiled::CompiledHashStrategy;
pub use compiler::{CompiledStrategyFactory, JoinCompiler};
pub use interpreted::InterpretedHashStrategy;

use std::cmp::Ordering;
use std::fmt;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{Int64Type, UInt64Type};
use colbatch_result::{Error, Result};

use crate::batch_builder::BatchBuilder;
use crate::types::ValueKind;

/// Hashing, equality and projection for one set of join channels.
///
/// Build-side rows are addressed by `(batch, position)` in the channel lists
/// the strategy was created with. Probe-side rows are a position plus the
/// probe key columns, in join-channel order and of the same types.
pub trait HashStrategy: Send + Sync + fmt::Debug {
    /// Number of output channels appended by [`HashStrategy::append_to`].
    fn channel_count(&self) -> usize;

    fn size_in_bytes(&self) -> usize;

    fn append_to(
        &self,
        batch: usize,
        position: usize,
        builder: &mut BatchBuilder,
        output_channel_offset: usize,
    ) -> Result<()>;

    fn hash_position(&self, batch: usize, position: usize) -> u64;

    fn hash_row(&self, position: usize, probe_keys: &[ArrayRef]) -> u64;

    /// SQL equality: a null on either side never matches.
    fn position_equals_row(
        &self,
        left_batch: usize,
        left_position: usize,
        right_position: usize,
        right_keys: &[ArrayRef],
    ) -> bool;

    /// Like [`HashStrategy::position_equals_row`] but two nulls are equal.
    fn position_not_distinct_from_row(
        &self,
        left_batch: usize,
        left_position: usize,
        right_position: usize,
        right_keys: &[ArrayRef],
    ) -> bool;

    fn position_equals_position(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> bool;

    fn position_not_distinct_from_position(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> bool;

    /// True when any join key of the row is null.
    fn is_position_null(&self, batch: usize, position: usize) -> bool;

    /// Ascending order of the sort channel, nulls last. `Equal` when the
    /// strategy has no sort channel.
    fn compare_sort_channel_positions(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> Ordering;

    fn is_sort_channel_position_null(&self, batch: usize, position: usize) -> bool;
}

/// Channels a hash strategy is created over.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HashStrategyOptions {
    pub join_channels: Vec<usize>,
    /// Channel holding a precomputed `Int64` or `UInt64` row hash.
    pub hash_channel: Option<usize>,
    pub sort_channel: Option<usize>,
    /// Channels copied by `append_to`; every channel when `None`.
    pub output_channels: Option<Vec<usize>>,
}

impl HashStrategyOptions {
    pub fn new(join_channels: Vec<usize>) -> Self {
        Self {
            join_channels,
            ..Self::default()
        }
    }

    pub fn with_hash_channel(mut self, hash_channel: Option<usize>) -> Self {
        self.hash_channel = hash_channel;
        self
    }

    pub fn with_sort_channel(mut self, sort_channel: Option<usize>) -> Self {
        self.sort_channel = sort_channel;
        self
    }

    pub fn with_output_channels(mut self, output_channels: Vec<usize>) -> Self {
        self.output_channels = Some(output_channels);
        self
    }

    /// Output channels resolved against an index with `channel_count` channels.
    pub fn resolved_output_channels(&self, channel_count: usize) -> Vec<usize> {
        self.output_channels
            .clone()
            .unwrap_or_else(|| (0..channel_count).collect())
    }

    /// Check every referenced channel against the index's kinds.
    pub fn validate(&self, kinds: &[ValueKind]) -> Result<()> {
        let check = |channel: usize, role: &str| {
            if channel >= kinds.len() {
                Err(Error::InvalidArgumentError(format!(
                    "{role} channel {channel} out of range for {} channels",
                    kinds.len()
                )))
            } else {
                Ok(())
            }
        };
        let check_operators = |channel: usize, role: &str| {
            check(channel, role)?;
            if kinds[channel].has_operators() {
                Ok(())
            } else {
                Err(Error::InvalidArgumentError(format!(
                    "{role} channel {channel} holds values that cannot be hashed or compared"
                )))
            }
        };
        for &channel in &self.join_channels {
            check_operators(channel, "join")?;
        }
        if let Some(channel) = self.hash_channel {
            check(channel, "hash")?;
            if !matches!(kinds[channel], ValueKind::Int64 | ValueKind::UInt64) {
                return Err(Error::InvalidArgumentError(format!(
                    "hash channel {channel} must be Int64 or UInt64, found {:?}",
                    kinds[channel]
                )));
            }
        }
        if let Some(channel) = self.sort_channel {
            check_operators(channel, "sort")?;
        }
        for &channel in self.output_channels.iter().flatten() {
            check(channel, "output")?;
        }
        Ok(())
    }
}

/// Channel lists and projections shared by both strategy implementations.
#[derive(Clone, Debug)]
pub(crate) struct StrategyChannels {
    pub(crate) kinds: Vec<ValueKind>,
    pub(crate) channels: Vec<Vec<ArrayRef>>,
    pub(crate) join_channels: Vec<usize>,
    pub(crate) hash_channel: Option<usize>,
    pub(crate) sort_channel: Option<usize>,
    pub(crate) output_channels: Vec<usize>,
}

impl StrategyChannels {
    pub(crate) fn try_new(
        kinds: Vec<ValueKind>,
        channels: Vec<Vec<ArrayRef>>,
        options: &HashStrategyOptions,
    ) -> Result<Self> {
        options.validate(&kinds)?;
        if channels.len() != kinds.len() {
            return Err(Error::Internal(format!(
                "{} channel lists for {} channel kinds",
                channels.len(),
                kinds.len()
            )));
        }
        Ok(Self {
            output_channels: options.resolved_output_channels(kinds.len()),
            join_channels: options.join_channels.clone(),
            hash_channel: options.hash_channel,
            sort_channel: options.sort_channel,
            kinds,
            channels,
        })
    }

    #[inline]
    pub(crate) fn array(&self, channel: usize, batch: usize) -> &dyn Array {
        self.channels[channel][batch].as_ref()
    }

    pub(crate) fn key_kinds(&self) -> Vec<ValueKind> {
        self.join_channels
            .iter()
            .map(|&channel| self.kinds[channel])
            .collect()
    }

    pub(crate) fn append_to(
        &self,
        batch: usize,
        position: usize,
        builder: &mut BatchBuilder,
        output_channel_offset: usize,
    ) -> Result<()> {
        for (i, &channel) in self.output_channels.iter().enumerate() {
            builder.append(
                output_channel_offset + i,
                self.array(channel, batch),
                position,
            )?;
        }
        Ok(())
    }

    pub(crate) fn precomputed_hash(&self, batch: usize, position: usize) -> Option<u64> {
        let array = self.array(self.hash_channel?, batch);
        if let Some(hashes) = array.as_primitive_opt::<UInt64Type>() {
            return Some(hashes.value(position));
        }
        array
            .as_primitive_opt::<Int64Type>()
            .map(|hashes| hashes.value(position) as u64)
    }

    pub(crate) fn compare_sort(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> Ordering {
        let Some(channel) = self.sort_channel else {
            return Ordering::Equal;
        };
        let left = self.array(channel, left_batch);
        let right = self.array(channel, right_batch);
        match (left.is_null(left_position), right.is_null(right_position)) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.kinds[channel].compare(left, left_position, right, right_position),
        }
    }

    pub(crate) fn is_sort_null(&self, batch: usize, position: usize) -> bool {
        self.sort_channel
            .is_some_and(|channel| self.array(channel, batch).is_null(position))
    }

    pub(crate) fn size_in_bytes(&self) -> usize {
        size_of::<Self>()
            + self
                .channels
                .iter()
                .map(|batches| batches.capacity() * size_of::<ArrayRef>())
                .sum::<usize>()
            + self.kinds.capacity() * size_of::<ValueKind>()
            + (self.join_channels.capacity() + self.output_channels.capacity()) * size_of::<usize>()
    }
}
