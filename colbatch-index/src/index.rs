use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayBuilder, ArrayRef, MutableArrayData, make_array};
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use colbatch_result::{Error, Result};

use crate::address::{decode_indices, encode_synthetic_address};
use crate::batch_builder::channel_schema;
use crate::comparator::ChannelComparator;
use crate::config::BatchIndexConfig;
use crate::iter::{Batches, SortedBatches};
use crate::ordering::OrderingCompiler;
use crate::strategy::{HashStrategy, HashStrategyOptions, InterpretedHashStrategy, JoinCompiler};
use crate::types::{SortOrder, ValueKind};

/// Hard cap on the rows one index may hold.
pub const MAX_POSITIONS: usize = 2_000_000_000;

/// Retained row batches plus a permutable logical row order.
///
/// Batches are kept as the caller handed them in (or as compact copies in
/// eager-compaction mode), one `Vec<ArrayRef>` per channel. Every row gets a
/// synthetic address in `value_addresses`; sorting permutes only that list.
/// All positional accessors take a *logical* position, i.e. an index into the
/// address list.
pub struct BatchIndex {
    types: Vec<DataType>,
    kinds: Vec<ValueKind>,
    schema: SchemaRef,
    config: BatchIndexConfig,
    ordering_compiler: Arc<OrderingCompiler>,
    join_compiler: Arc<JoinCompiler>,

    value_addresses: Vec<u64>,
    channels: Vec<Vec<ArrayRef>>,
    batch_position_counts: Vec<usize>,

    position_count: usize,
    batch_count: usize,
    next_batch_to_compact: usize,
    batches_memory_retained_size: usize,
    estimated_size: usize,
    max_positions: usize,
}

impl BatchIndex {
    /// Standalone index with the default configuration and its own compilers.
    pub fn new(types: Vec<DataType>, expected_positions: usize) -> Result<Self> {
        Self::with_components(
            channel_schema(&types),
            expected_positions,
            BatchIndexConfig::default(),
            Arc::new(OrderingCompiler::new()),
            Arc::new(JoinCompiler::default()),
        )
    }

    pub(crate) fn with_components(
        schema: SchemaRef,
        expected_positions: usize,
        config: BatchIndexConfig,
        ordering_compiler: Arc<OrderingCompiler>,
        join_compiler: Arc<JoinCompiler>,
    ) -> Result<Self> {
        config.validate()?;
        let types: Vec<DataType> = schema
            .fields()
            .iter()
            .map(|field| field.data_type().clone())
            .collect();
        let kinds = ValueKind::of_all(&types);
        let mut value_addresses = Vec::new();
        value_addresses
            .try_reserve_exact(expected_positions.min(MAX_POSITIONS))
            .map_err(|err| Error::InsufficientResources(err.to_string()))?;

        let mut index = Self {
            channels: vec![Vec::new(); types.len()],
            types,
            kinds,
            schema,
            config,
            ordering_compiler,
            join_compiler,
            value_addresses,
            batch_position_counts: Vec::new(),
            position_count: 0,
            batch_count: 0,
            next_batch_to_compact: 0,
            batches_memory_retained_size: 0,
            estimated_size: 0,
            max_positions: MAX_POSITIONS,
        };
        index.update_estimated_size();
        Ok(index)
    }

    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    pub fn kinds(&self) -> &[ValueKind] {
        &self.kinds
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn config(&self) -> &BatchIndexConfig {
        &self.config
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    /// The logical row order.
    pub fn value_addresses(&self) -> &[u64] {
        &self.value_addresses
    }

    /// Retained arrays of `channel`, in batch order.
    pub fn channel(&self, channel: usize) -> Result<&[ArrayRef]> {
        self.channels
            .get(channel)
            .map(Vec::as_slice)
            .ok_or_else(|| self.channel_out_of_range(channel))
    }

    pub fn channels(&self) -> &[Vec<ArrayRef>] {
        &self.channels
    }

    /// Row count of every retained batch, in batch order.
    pub fn batch_position_counts(&self) -> &[usize] {
        &self.batch_position_counts
    }

    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    /// Retain `batch` and append its rows to the logical order.
    ///
    /// Empty batches are ignored. Nothing is modified when the batch has the
    /// wrong shape or would push the index past [`MAX_POSITIONS`].
    pub fn add_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        if batch.num_columns() != self.types.len() {
            return Err(Error::InvalidArgumentError(format!(
                "batch has {} columns, index has {} channels",
                batch.num_columns(),
                self.types.len()
            )));
        }
        for (channel, (column, expected)) in batch.columns().iter().zip(&self.types).enumerate() {
            if column.data_type() != expected {
                return Err(Error::InvalidArgumentError(format!(
                    "channel {channel} expects {expected}, batch column is {}",
                    column.data_type()
                )));
            }
        }

        let rows = batch.num_rows();
        if rows == 0 {
            return Ok(());
        }
        let resulting = self.position_count.saturating_add(rows);
        if resulting >= self.max_positions {
            return Err(Error::InsufficientResources(format!(
                "batch index cannot hold {resulting} positions (limit {})",
                self.max_positions
            )));
        }
        let batch_ordinal = u32::try_from(self.batch_count).map_err(|_| {
            Error::InsufficientResources(format!(
                "batch ordinal {} exceeds the synthetic address range",
                self.batch_count
            ))
        })?;
        self.value_addresses
            .try_reserve(rows)
            .map_err(|err| Error::InsufficientResources(err.to_string()))?;
        let columns = if self.config.eager_compaction {
            batch
                .columns()
                .iter()
                .map(|column| compact_array(column.as_ref()))
                .collect::<Vec<_>>()
        } else {
            batch.columns().to_vec()
        };

        // Validation is done; everything below is infallible.
        for (channel, column) in self.channels.iter_mut().zip(columns) {
            self.batches_memory_retained_size += column.get_array_memory_size();
            channel.push(column);
        }
        // Positions fit in u32 because the row cap is below u32::MAX.
        self.value_addresses.extend(
            (0..rows as u32).map(|position| encode_synthetic_address(batch_ordinal, position)),
        );
        self.batch_position_counts.push(rows);
        self.position_count = resulting;
        self.batch_count += 1;
        if self.config.eager_compaction {
            self.next_batch_to_compact = self.batch_count;
        }
        self.update_estimated_size();

        tracing::trace!(
            rows,
            batch = self.batch_count - 1,
            positions = self.position_count,
            estimated_size = self.estimated_size,
            "added batch to index"
        );
        Ok(())
    }

    /// Drop every batch and address and reset all counters.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
            channel.shrink_to_fit();
        }
        self.value_addresses.clear();
        self.value_addresses.shrink_to_fit();
        self.batch_position_counts.clear();
        self.batch_position_counts.shrink_to_fit();
        self.position_count = 0;
        self.batch_count = 0;
        self.next_batch_to_compact = 0;
        self.batches_memory_retained_size = 0;
        self.update_estimated_size();
    }

    /// Replace every not yet compacted retained array with a compact copy.
    ///
    /// No-op in eager-compaction mode, for indexes without channels, and when
    /// no batch was added since the previous call.
    pub fn compact(&mut self) {
        if self.config.eager_compaction || self.types.is_empty() {
            return;
        }
        let first = self.next_batch_to_compact;
        if first == self.batch_count {
            return;
        }
        for channel in &mut self.channels {
            for array in &mut channel[first..] {
                let compacted = compact_array(array.as_ref());
                self.batches_memory_retained_size -= array.get_array_memory_size();
                self.batches_memory_retained_size += compacted.get_array_memory_size();
                *array = compacted;
            }
        }
        self.next_batch_to_compact = self.batch_count;
        self.update_estimated_size();
        tracing::trace!(
            batches = self.batch_count - first,
            estimated_size = self.estimated_size,
            "compacted batch index"
        );
    }

    /// Exchange two logical positions.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        self.check_position(a)?;
        self.check_position(b)?;
        self.value_addresses.swap(a, b);
        Ok(())
    }

    /// Sort the whole logical order.
    pub fn sort(&mut self, sort_channels: &[usize], sort_orders: &[SortOrder]) -> Result<()> {
        self.sort_range(sort_channels, sort_orders, 0, self.position_count)
    }

    /// Sort logical positions `[start, end)` in place.
    ///
    /// Rows with equal sort keys end up in synthetic-address order, so the
    /// result is deterministic. Only the address list changes.
    pub fn sort_range(
        &mut self,
        sort_channels: &[usize],
        sort_orders: &[SortOrder],
        start: usize,
        end: usize,
    ) -> Result<()> {
        if start > end || end > self.position_count {
            return Err(Error::InvalidArgumentError(format!(
                "sort range [{start}, {end}) outside [0, {})",
                self.position_count
            )));
        }
        if sort_channels.is_empty() && sort_orders.is_empty() {
            return Ok(());
        }
        let ordering = self.ordering_compiler.compile_position_ordering(
            &self.types,
            sort_channels,
            sort_orders,
        )?;
        if end - start < 2 {
            return Ok(());
        }
        let rows = ordering.convert_batches(&self.channels, self.batch_count)?;
        self.value_addresses[start..end].sort_unstable_by(|&left, &right| {
            let (left_batch, left_position) = decode_indices(left);
            let (right_batch, right_position) = decode_indices(right);
            rows[left_batch]
                .row(left_position)
                .cmp(&rows[right_batch].row(right_position))
                .then(left.cmp(&right))
        });
        tracing::debug!(
            sort_channels = ?sort_channels,
            start,
            end,
            "sorted batch index range"
        );
        Ok(())
    }

    pub fn is_null(&self, channel: usize, position: usize) -> Result<bool> {
        let (array, offset) = self.resolve(channel, position)?;
        Ok(array.is_null(offset))
    }

    pub fn get_boolean(&self, channel: usize, position: usize) -> Result<bool> {
        let (array, offset) = self.resolve(channel, position)?;
        self.kinds[channel].get_boolean(array.as_ref(), offset)
    }

    pub fn get_long(&self, channel: usize, position: usize) -> Result<i64> {
        let (array, offset) = self.resolve(channel, position)?;
        self.kinds[channel].get_long(array.as_ref(), offset)
    }

    pub fn get_double(&self, channel: usize, position: usize) -> Result<f64> {
        let (array, offset) = self.resolve(channel, position)?;
        self.kinds[channel].get_double(array.as_ref(), offset)
    }

    pub fn get_bytes(&self, channel: usize, position: usize) -> Result<&[u8]> {
        let (array, offset) = self.resolve(channel, position)?;
        self.kinds[channel].get_bytes(array.as_ref(), offset)
    }

    /// Zero-copy single-row view of the value at `position`.
    pub fn get_object(&self, channel: usize, position: usize) -> Result<ArrayRef> {
        let (array, offset) = self.resolve(channel, position)?;
        Ok(array.slice(offset, 1))
    }

    /// Owned single-row copy of the value at `position`; retains nothing of
    /// the source batch.
    pub fn get_single_value_array(&self, channel: usize, position: usize) -> Result<ArrayRef> {
        let (array, offset) = self.resolve(channel, position)?;
        Ok(compact_array(array.slice(offset, 1).as_ref()))
    }

    /// Retained array holding logical `position` of `channel`.
    pub fn raw_array(&self, channel: usize, position: usize) -> Result<&ArrayRef> {
        self.resolve(channel, position).map(|(array, _)| array)
    }

    /// Offset of logical `position` inside its retained batch.
    pub fn raw_array_position(&self, position: usize) -> Result<usize> {
        self.check_position(position)?;
        Ok(decode_indices(self.value_addresses[position]).1)
    }

    /// Append the value at `position` of `channel` to `builder`. Stored
    /// channels have no typed builder path; copy them through a
    /// [`BatchBuilder`](crate::BatchBuilder) instead.
    pub fn append_to(
        &self,
        channel: usize,
        position: usize,
        builder: &mut dyn ArrayBuilder,
    ) -> Result<()> {
        let (array, offset) = self.resolve(channel, position)?;
        self.kinds[channel].append(array.as_ref(), offset, builder)?;
        Ok(())
    }

    /// Hash strategy over `join_channels`, copying every channel on output.
    pub fn create_hash_strategy(
        &self,
        join_channels: &[usize],
        hash_channel: Option<usize>,
    ) -> Result<Box<dyn HashStrategy>> {
        self.create_hash_strategy_with(
            &HashStrategyOptions::new(join_channels.to_vec()).with_hash_channel(hash_channel),
        )
    }

    /// Hash strategy for `options`: the compiled one when the join compiler
    /// can specialise the key layout, the interpreted one otherwise.
    ///
    /// The strategy holds its own copy of the channel lists, so the index may
    /// be cleared afterwards.
    pub fn create_hash_strategy_with(
        &self,
        options: &HashStrategyOptions,
    ) -> Result<Box<dyn HashStrategy>> {
        options.validate(&self.kinds)?;
        if options.join_channels.is_empty() {
            return self.interpreted_strategy(options);
        }

        let output_channels = options.resolved_output_channels(self.types.len());
        let compiled = self
            .join_compiler
            .compile_hash_strategy_factory(
                &self.types,
                &options.join_channels,
                options.sort_channel,
                &output_channels,
            )
            .and_then(|factory| factory.create(self.channels.clone(), options.hash_channel));
        match compiled {
            Ok(strategy) => Ok(Box::new(strategy)),
            Err(err) => {
                if self.join_compiler.is_enabled() {
                    tracing::error!(
                        error = %err,
                        types = ?self.types,
                        join_channels = ?options.join_channels,
                        "hash strategy compilation failed; using interpreted strategy"
                    );
                } else {
                    tracing::debug!(error = %err, "using interpreted hash strategy");
                }
                self.interpreted_strategy(options)
            }
        }
    }

    fn interpreted_strategy(&self, options: &HashStrategyOptions) -> Result<Box<dyn HashStrategy>> {
        Ok(Box::new(InterpretedHashStrategy::try_new(
            self.kinds.clone(),
            self.channels.clone(),
            options,
        )?))
    }

    /// Null-safe key equality of two logical positions.
    pub fn position_not_distinct_from_position(
        &self,
        strategy: &dyn HashStrategy,
        left_position: usize,
        right_position: usize,
    ) -> Result<bool> {
        let (left_batch, left_offset) = self.address_indices(left_position)?;
        let (right_batch, right_offset) = self.address_indices(right_position)?;
        Ok(strategy.position_not_distinct_from_position(
            left_batch,
            left_offset,
            right_batch,
            right_offset,
        ))
    }

    /// Null-safe key equality of a logical position and a probe row.
    pub fn position_not_distinct_from_row(
        &self,
        strategy: &dyn HashStrategy,
        index_position: usize,
        probe_position: usize,
        probe_keys: &[ArrayRef],
    ) -> Result<bool> {
        let (batch, offset) = self.address_indices(index_position)?;
        Ok(strategy.position_not_distinct_from_row(batch, offset, probe_position, probe_keys))
    }

    /// Comparator of `left_channel` against `right_channel`, nulls last.
    pub fn create_channel_comparator(
        &self,
        left_channel: usize,
        right_channel: usize,
    ) -> Result<ChannelComparator> {
        let left = self.kind(left_channel)?;
        let right = self.kind(right_channel)?;
        if !left.has_operators() {
            return Err(Error::UnsupportedType(self.types[left_channel].clone()));
        }
        if left != right || self.types[left_channel] != self.types[right_channel] {
            return Err(Error::InvalidArgumentError(format!(
                "cannot compare channel {left_channel} ({}) with channel {right_channel} ({})",
                self.types[left_channel], self.types[right_channel]
            )));
        }
        Ok(ChannelComparator::new(left_channel, right_channel, left))
    }

    /// Retained batches in insertion order.
    pub fn batches(&self) -> Batches<'_> {
        Batches::new(self)
    }

    /// Batches rebuilt in logical order, bounded by the configured sorted
    /// batch limits.
    pub fn sorted_batches(&self) -> Result<SortedBatches<'_>> {
        SortedBatches::new(
            self,
            self.config.sorted_batch_max_rows,
            self.config.sorted_batch_max_bytes,
        )
    }

    pub(crate) fn address_indices(&self, position: usize) -> Result<(usize, usize)> {
        self.check_position(position)?;
        Ok(decode_indices(self.value_addresses[position]))
    }

    fn resolve(&self, channel: usize, position: usize) -> Result<(&ArrayRef, usize)> {
        let batches = self.channel(channel)?;
        let (batch, offset) = self.address_indices(position)?;
        Ok((&batches[batch], offset))
    }

    fn kind(&self, channel: usize) -> Result<ValueKind> {
        self.kinds
            .get(channel)
            .copied()
            .ok_or_else(|| self.channel_out_of_range(channel))
    }

    fn check_position(&self, position: usize) -> Result<()> {
        if position >= self.position_count {
            return Err(Error::InvalidArgumentError(format!(
                "position {position} out of range for {} positions",
                self.position_count
            )));
        }
        Ok(())
    }

    fn channel_out_of_range(&self, channel: usize) -> Error {
        Error::InvalidArgumentError(format!(
            "channel {channel} out of range for {} channels",
            self.types.len()
        ))
    }

    fn update_estimated_size(&mut self) {
        self.estimated_size = size_of::<Self>()
            + self.batches_memory_retained_size
            + self.value_addresses.capacity() * size_of::<u64>()
            + self
                .channels
                .iter()
                .map(|channel| channel.capacity() * size_of::<ArrayRef>())
                .sum::<usize>()
            + self.batch_position_counts.capacity() * size_of::<usize>();
    }
}

impl fmt::Debug for BatchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchIndex")
            .field("types", &self.types)
            .field("position_count", &self.position_count)
            .field("batch_count", &self.batch_count)
            .field("estimated_size", &self.estimated_size)
            .field("config", &self.config)
            .finish()
    }
}

impl fmt::Display for BatchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchIndex{{positions={}, types=[", self.position_count)?;
        for (i, data_type) in self.types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{data_type}")?;
        }
        write!(f, "], estimated_size={}}}", self.estimated_size)
    }
}

/// Copy `array` into freshly allocated buffers sized to its logical length.
pub fn compact_array(array: &dyn Array) -> ArrayRef {
    let data = array.to_data();
    let mut copy = MutableArrayData::new(vec![&data], false, data.len());
    copy.extend(0, 0, data.len());
    make_array(copy.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, Int64Array, Int64Builder, StringArray};
    use arrow::datatypes::Int64Type;
    use colbatch_test_utils::{init_tracing_for_tests, int64_batch, keyed_batch, keyed_types};

    fn keyed_index() -> BatchIndex {
        let mut index = BatchIndex::new(keyed_types(), 8).unwrap();
        index
            .add_batch(&keyed_batch(&[Some(3), None, Some(1)], &[Some("c"), Some("n"), None]))
            .unwrap();
        index
            .add_batch(&keyed_batch(&[Some(2)], &[Some("b")]))
            .unwrap();
        index
    }

    #[test]
    fn add_batch_assigns_addresses() {
        init_tracing_for_tests();
        let index = keyed_index();
        assert_eq!(index.position_count(), 4);
        assert_eq!(index.batch_count(), 2);
        assert_eq!(
            index.value_addresses(),
            &[
                encode_synthetic_address(0, 0),
                encode_synthetic_address(0, 1),
                encode_synthetic_address(0, 2),
                encode_synthetic_address(1, 0),
            ]
        );
        assert_eq!(index.get_long(0, 3).unwrap(), 2);
        assert_eq!(index.get_bytes(1, 0).unwrap(), b"c");
        assert!(index.is_null(0, 1).unwrap());
        assert_eq!(index.raw_array_position(3).unwrap(), 0);
    }

    #[test]
    fn empty_and_malformed_batches() {
        let mut index = BatchIndex::new(vec![DataType::Int64], 0).unwrap();
        index.add_batch(&int64_batch(&[])).unwrap();
        assert_eq!(index.batch_count(), 0);

        let wrong = keyed_batch(&[Some(1)], &[Some("x")]);
        assert!(matches!(
            index.add_batch(&wrong),
            Err(Error::InvalidArgumentError(_))
        ));
        assert_eq!(index.position_count(), 0);
    }

    #[test]
    fn capacity_cap_is_checked_before_mutation() {
        let mut index = BatchIndex::new(vec![DataType::Int64], 0).unwrap();
        index.max_positions = 5;
        index.add_batch(&int64_batch(&[1, 2, 3])).unwrap();
        let size_before = index.estimated_size();

        let err = index.add_batch(&int64_batch(&[4, 5])).unwrap_err();
        assert!(matches!(err, Error::InsufficientResources(_)));
        assert_eq!(index.position_count(), 3);
        assert_eq!(index.batch_count(), 1);
        assert_eq!(index.channel(0).unwrap().len(), 1);
        assert_eq!(index.estimated_size(), size_before);

        index.add_batch(&int64_batch(&[4])).unwrap();
        assert_eq!(index.position_count(), 4);
    }

    #[test]
    fn sort_orders_rows_and_nulls() {
        init_tracing_for_tests();
        let mut index = keyed_index();
        index.sort(&[0], &[SortOrder::AscNullsFirst]).unwrap();
        assert!(index.is_null(0, 0).unwrap());
        let rest: Vec<i64> = (1..4).map(|p| index.get_long(0, p).unwrap()).collect();
        assert_eq!(rest, vec![1, 2, 3]);

        index.sort(&[0], &[SortOrder::DescNullsLast]).unwrap();
        let head: Vec<i64> = (0..3).map(|p| index.get_long(0, p).unwrap()).collect();
        assert_eq!(head, vec![3, 2, 1]);
        assert!(index.is_null(0, 3).unwrap());
        // batches themselves are untouched
        assert_eq!(
            index.channel(0).unwrap()[0].as_primitive::<Int64Type>().value(0),
            3
        );
    }

    #[test]
    fn sort_range_leaves_outside_untouched() {
        let mut index = BatchIndex::new(vec![DataType::Int64], 4).unwrap();
        index.add_batch(&int64_batch(&[9, 8, 7, 6])).unwrap();
        index
            .sort_range(&[0], &[SortOrder::AscNullsLast], 1, 3)
            .unwrap();
        let values: Vec<i64> = (0..4).map(|p| index.get_long(0, p).unwrap()).collect();
        assert_eq!(values, vec![9, 7, 8, 6]);
        assert!(index
            .sort_range(&[0], &[SortOrder::AscNullsLast], 3, 5)
            .is_err());
    }

    #[test]
    fn equal_keys_keep_address_order() {
        let mut index = BatchIndex::new(vec![DataType::Int64], 4).unwrap();
        index.add_batch(&int64_batch(&[5, 1, 5])).unwrap();
        index.add_batch(&int64_batch(&[1])).unwrap();
        index.sort(&[0], &[SortOrder::AscNullsLast]).unwrap();
        assert_eq!(
            index.value_addresses(),
            &[
                encode_synthetic_address(0, 1),
                encode_synthetic_address(1, 0),
                encode_synthetic_address(0, 0),
                encode_synthetic_address(0, 2),
            ]
        );
    }

    #[test]
    fn clear_resets_everything() {
        let mut index = keyed_index();
        let empty_size = BatchIndex::new(keyed_types(), 0).unwrap().estimated_size();
        index.clear();
        assert_eq!(index.position_count(), 0);
        assert_eq!(index.batch_count(), 0);
        assert!(index.value_addresses().is_empty());
        assert!(index.channel(0).unwrap().is_empty());
        assert_eq!(index.estimated_size(), empty_size);

        index
            .add_batch(&keyed_batch(&[Some(7)], &[Some("z")]))
            .unwrap();
        assert_eq!(index.value_addresses(), &[encode_synthetic_address(0, 0)]);
    }

    #[test]
    fn compaction_copies_views_once() {
        let backing = Int64Array::from((0..4096).collect::<Vec<i64>>());
        let view = int64_batch(&[]).schema();
        let slice = RecordBatch::try_new(view, vec![Arc::new(backing.slice(10, 4)) as ArrayRef])
            .unwrap();

        let mut index = BatchIndex::new(vec![DataType::Int64], 4).unwrap();
        index.add_batch(&slice).unwrap();
        let lazy_size = index.estimated_size();
        index.compact();
        let compacted_size = index.estimated_size();
        assert!(compacted_size < lazy_size);
        assert_eq!(index.get_long(0, 0).unwrap(), 10);
        let retained = &index.channel(0).unwrap()[0];
        assert_eq!(retained.to_data().offset(), 0);

        index.compact();
        assert_eq!(index.estimated_size(), compacted_size);
    }

    #[test]
    fn eager_compaction_copies_on_add() {
        let backing = Int64Array::from((0..4096).collect::<Vec<i64>>());
        let schema = int64_batch(&[]).schema();
        let slice = RecordBatch::try_new(schema.clone(), vec![Arc::new(backing.slice(0, 2)) as ArrayRef])
            .unwrap();

        let mut index = BatchIndex::with_components(
            schema,
            2,
            BatchIndexConfig::default().with_eager_compaction(true),
            Arc::new(OrderingCompiler::new()),
            Arc::new(JoinCompiler::default()),
        )
        .unwrap();
        index.add_batch(&slice).unwrap();
        let size = index.estimated_size();
        assert!(index.channel(0).unwrap()[0].get_array_memory_size() < backing.get_array_memory_size());
        index.compact();
        assert_eq!(index.estimated_size(), size);
    }

    #[test]
    fn accessors_validate_arguments() {
        let index = keyed_index();
        assert!(index.get_long(2, 0).is_err());
        assert!(index.get_long(0, 4).is_err());
        assert!(index.get_double(0, 0).is_err());

        let single = index.get_single_value_array(1, 0).unwrap();
        assert_eq!(single.as_string::<i32>().value(0), "c");
        let view = index.get_object(1, 0).unwrap();
        assert_eq!(view.len(), 1);

        let mut builder = Int64Builder::new();
        index.append_to(0, 0, &mut builder).unwrap();
        index.append_to(0, 1, &mut builder).unwrap();
        let built = builder.finish();
        assert_eq!(built.value(0), 3);
        assert!(built.is_null(1));
    }

    #[test]
    fn not_distinct_from_is_symmetric_and_null_safe() {
        let index = keyed_index();
        let strategy = index.create_hash_strategy(&[0, 1], None).unwrap();
        for left in 0..index.position_count() {
            for right in 0..index.position_count() {
                assert_eq!(
                    index
                        .position_not_distinct_from_position(strategy.as_ref(), left, right)
                        .unwrap(),
                    index
                        .position_not_distinct_from_position(strategy.as_ref(), right, left)
                        .unwrap()
                );
            }
        }

        let mut nulls = BatchIndex::new(keyed_types(), 2).unwrap();
        nulls
            .add_batch(&keyed_batch(&[None, None], &[None, None]))
            .unwrap();
        let strategy = nulls.create_hash_strategy(&[0, 1], None).unwrap();
        assert!(nulls
            .position_not_distinct_from_position(strategy.as_ref(), 0, 1)
            .unwrap());
        assert!(!strategy.position_equals_position(0, 0, 0, 1));

        let probe: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![None::<i64>])),
            Arc::new(StringArray::from(vec![None::<&str>])),
        ];
        assert!(nulls
            .position_not_distinct_from_row(strategy.as_ref(), 0, 0, &probe)
            .unwrap());
    }

    #[test]
    fn channel_comparator_requires_matching_types() {
        let index = keyed_index();
        assert!(index.create_channel_comparator(0, 1).is_err());
        assert!(index.create_channel_comparator(0, 5).is_err());
        let comparator = index.create_channel_comparator(0, 0).unwrap();
        assert_eq!(
            comparator.compare(&index, 0, 2).unwrap(),
            std::cmp::Ordering::Greater
        );
    }

    #[test]
    fn display_reports_shape() {
        let index = keyed_index();
        let rendered = index.to_string();
        assert!(rendered.starts_with("BatchIndex{positions=4, types=[Int64, Utf8]"));
    }
}
