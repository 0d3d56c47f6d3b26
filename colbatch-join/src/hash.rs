//! Hash lookup source: an open-addressing table of key-group heads plus
//! per-position links to the rest of each group.

use std::cmp::Ordering;
use std::fmt;

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;
use colbatch_index::{
    BatchBuilder, BatchIndex, HashStrategy, HashStrategyOptions, decode_synthetic_address,
};
use colbatch_result::{Error, Result};
use rustc_hash::FxHashMap;

use crate::filter::{BuildRow, JoinFilterRef};
use crate::lookup::LookupSource;
use crate::options::LookupSourceOptions;
use crate::probe::JoinProbe;

const EMPTY: u32 = u32::MAX;

#[inline]
fn decode(address: u64) -> (usize, usize) {
    let (batch, position) = decode_synthetic_address(address);
    (batch as usize, position as usize)
}

#[inline]
fn bucket(hash: u64, mask: usize) -> usize {
    // Fold the high half in so hashes that differ only there still spread.
    ((hash ^ (hash >> 32)) as usize) & mask
}

/// Table size for `positions` entries at `load_factor`; always leaves at
/// least one empty slot so probing terminates.
fn table_capacity(positions: usize, load_factor: f64) -> usize {
    ((positions as f64 / load_factor).ceil() as usize + 1).next_power_of_two()
}

/// Hash lookup source over a snapshot of a batch index.
///
/// Rows with equal join keys form a group. The table stores the first
/// position of every group and `links` chains the rest: in ascending logical
/// position order by default, or in ascending sort-channel order when the
/// source was built with a sort channel.
pub struct JoinHashLookupSource {
    strategy: Box<dyn HashStrategy>,
    channels: Vec<Vec<ArrayRef>>,
    addresses: Vec<u64>,
    key_types: Vec<DataType>,
    slots: Vec<u32>,
    mask: usize,
    position_hashes: Vec<u64>,
    links: Vec<u32>,
    /// Sorted members of each group keyed by group head; search filters only.
    sorted_groups: Option<FxHashMap<u32, Vec<u32>>>,
    filter: Option<JoinFilterRef>,
    search_filters: Vec<JoinFilterRef>,
    null_safe_keys: bool,
    group_count: usize,
    retained_batches_size: usize,
}

impl JoinHashLookupSource {
    pub fn try_new(index: &BatchIndex, options: LookupSourceOptions) -> Result<Self> {
        options.validate()?;
        let mut strategy_options = HashStrategyOptions::new(options.join_channels.clone())
            .with_hash_channel(options.hash_channel)
            .with_sort_channel(options.sort_channel);
        if let Some(output_channels) = &options.output_channels {
            strategy_options = strategy_options.with_output_channels(output_channels.clone());
        }
        let strategy = index.create_hash_strategy_with(&strategy_options)?;
        let key_types = options
            .join_channels
            .iter()
            .map(|&channel| index.types()[channel].clone())
            .collect();

        let addresses = index.value_addresses().to_vec();
        let position_count = addresses.len();
        if u32::try_from(position_count).map_or(true, |count| count == EMPTY) {
            return Err(Error::InsufficientResources(format!(
                "lookup source cannot address {position_count} positions"
            )));
        }
        let capacity = table_capacity(position_count, options.load_factor);
        let mut source = Self {
            strategy,
            channels: index.channels().to_vec(),
            addresses,
            key_types,
            slots: vec![EMPTY; capacity],
            mask: capacity - 1,
            position_hashes: vec![0; position_count],
            links: vec![EMPTY; position_count],
            sorted_groups: None,
            filter: options.filter,
            search_filters: options.search_filters,
            null_safe_keys: options.null_safe_keys,
            group_count: 0,
            retained_batches_size: 0,
        };
        source.retained_batches_size = source
            .channels
            .iter()
            .flatten()
            .map(|array| array.get_array_memory_size())
            .sum();
        source.build_chains();
        if options.sort_channel.is_some() {
            source.sort_groups();
        }

        tracing::debug!(
            positions = position_count,
            groups = source.group_count,
            capacity,
            sorted = options.sort_channel.is_some(),
            null_safe = source.null_safe_keys,
            "built hash lookup source"
        );
        Ok(source)
    }

    /// Hash strategy the source was built with.
    pub fn strategy(&self) -> &dyn HashStrategy {
        self.strategy.as_ref()
    }

    /// Number of distinct join keys in the table.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    fn build_chains(&mut self) {
        let skip_null_sort = !self.search_filters.is_empty();
        // Walking backwards makes every chain come out in ascending order.
        for position in (0..self.addresses.len()).rev() {
            let (batch, offset) = decode(self.addresses[position]);
            if !self.null_safe_keys && self.strategy.is_position_null(batch, offset) {
                continue;
            }
            if skip_null_sort && self.strategy.is_sort_channel_position_null(batch, offset) {
                continue;
            }
            let hash = self.strategy.hash_position(batch, offset);
            self.position_hashes[position] = hash;

            let mut slot = bucket(hash, self.mask);
            loop {
                let head = self.slots[slot];
                if head == EMPTY {
                    self.slots[slot] = position as u32;
                    self.group_count += 1;
                    break;
                }
                if self.position_hashes[head as usize] == hash
                    && self.positions_equal(head as usize, position)
                {
                    self.links[position] = head;
                    self.slots[slot] = position as u32;
                    break;
                }
                slot = (slot + 1) & self.mask;
            }
        }
    }

    /// Relink every group in sort-channel order, ties by logical position.
    fn sort_groups(&mut self) {
        let keep_groups = !self.search_filters.is_empty();
        let mut groups = FxHashMap::default();
        let mut group = Vec::new();
        for slot in 0..self.slots.len() {
            let head = self.slots[slot];
            if head == EMPTY {
                continue;
            }
            group.clear();
            let mut next = head;
            while next != EMPTY {
                group.push(next);
                next = self.links[next as usize];
            }
            group.sort_by(|&left, &right| {
                self.compare_sort(left as usize, right as usize)
                    .then(left.cmp(&right))
            });
            for pair in group.windows(2) {
                self.links[pair[0] as usize] = pair[1];
            }
            if let Some(&last) = group.last() {
                self.links[last as usize] = EMPTY;
            }
            self.slots[slot] = group[0];
            if keep_groups {
                groups.insert(group[0], group.clone());
            }
        }
        if keep_groups {
            self.sorted_groups = Some(groups);
        }
    }

    fn compare_sort(&self, left: usize, right: usize) -> Ordering {
        let (left_batch, left_offset) = decode(self.addresses[left]);
        let (right_batch, right_offset) = decode(self.addresses[right]);
        self.strategy
            .compare_sort_channel_positions(left_batch, left_offset, right_batch, right_offset)
    }

    fn positions_equal(&self, left: usize, right: usize) -> bool {
        let (left_batch, left_offset) = decode(self.addresses[left]);
        let (right_batch, right_offset) = decode(self.addresses[right]);
        if self.null_safe_keys {
            self.strategy
                .position_not_distinct_from_position(left_batch, left_offset, right_batch, right_offset)
        } else {
            self.strategy
                .position_equals_position(left_batch, left_offset, right_batch, right_offset)
        }
    }

    fn row_equals(&self, join_position: usize, probe: &JoinProbe<'_>, probe_position: usize) -> bool {
        let (batch, offset) = decode(self.addresses[join_position]);
        if self.null_safe_keys {
            self.strategy
                .position_not_distinct_from_row(batch, offset, probe_position, probe.keys())
        } else {
            self.strategy
                .position_equals_row(batch, offset, probe_position, probe.keys())
        }
    }

    fn find_group(&self, probe: &JoinProbe<'_>, probe_position: usize) -> Option<u32> {
        if probe_position >= probe.position_count() || !probe.has_key_types(&self.key_types) {
            return None;
        }
        if !self.null_safe_keys && probe.has_null_key(probe_position) {
            return None;
        }
        let hash = probe
            .precomputed_hash(probe_position)
            .unwrap_or_else(|| self.strategy.hash_row(probe_position, probe.keys()));
        let mut slot = bucket(hash, self.mask);
        loop {
            let head = self.slots[slot];
            if head == EMPTY {
                return None;
            }
            if self.position_hashes[head as usize] == hash
                && self.row_equals(head as usize, probe, probe_position)
            {
                return Some(head);
            }
            slot = (slot + 1) & self.mask;
        }
    }

    fn build_row(&self, join_position: usize) -> BuildRow<'_> {
        let (batch, offset) = decode(self.addresses[join_position]);
        BuildRow::new(&self.channels, batch, offset)
    }

    fn passes_search_filters(
        &self,
        join_position: usize,
        probe: &JoinProbe<'_>,
        probe_position: usize,
    ) -> bool {
        let row = self.build_row(join_position);
        self.search_filters
            .iter()
            .any(|filter| filter.filter(row, probe_position, probe.batch()))
    }
}

impl LookupSource for JoinHashLookupSource {
    fn channel_count(&self) -> usize {
        self.strategy.channel_count()
    }

    fn join_position_count(&self) -> usize {
        self.addresses.len()
    }

    fn key_types(&self) -> &[DataType] {
        &self.key_types
    }

    fn in_memory_size_in_bytes(&self) -> usize {
        let groups = self.sorted_groups.as_ref().map_or(0, |groups| {
            groups.capacity() * size_of::<(u32, Vec<u32>)>()
                + groups
                    .values()
                    .map(|group| group.capacity() * size_of::<u32>())
                    .sum::<usize>()
        });
        size_of::<Self>()
            + self.strategy.size_in_bytes()
            + self.retained_batches_size
            + self.addresses.capacity() * size_of::<u64>()
            + self.slots.capacity() * size_of::<u32>()
            + self.position_hashes.capacity() * size_of::<u64>()
            + self.links.capacity() * size_of::<u32>()
            + groups
    }

    fn get_join_position(&self, probe: &JoinProbe<'_>, probe_position: usize) -> Option<usize> {
        let head = self.find_group(probe, probe_position)?;
        let Some(groups) = &self.sorted_groups else {
            return Some(head as usize);
        };
        let group = groups.get(&head)?;
        let start = group.partition_point(|&position| {
            !self.passes_search_filters(position as usize, probe, probe_position)
        });
        group.get(start).map(|&position| position as usize)
    }

    fn get_next_join_position(
        &self,
        current: usize,
        probe: &JoinProbe<'_>,
        probe_position: usize,
    ) -> Option<usize> {
        let next = *self.links.get(current)?;
        if next == EMPTY {
            return None;
        }
        let next = next as usize;
        if self.sorted_groups.is_some() && !self.passes_search_filters(next, probe, probe_position) {
            return None;
        }
        Some(next)
    }

    fn is_join_position_eligible(
        &self,
        join_position: usize,
        probe: &JoinProbe<'_>,
        probe_position: usize,
    ) -> bool {
        match &self.filter {
            Some(filter) => filter.filter(self.build_row(join_position), probe_position, probe.batch()),
            None => true,
        }
    }

    fn append_to(
        &self,
        join_position: usize,
        builder: &mut BatchBuilder,
        output_channel_offset: usize,
    ) -> Result<()> {
        let address = *self.addresses.get(join_position).ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "join position {join_position} out of range for {} positions",
                self.addresses.len()
            ))
        })?;
        let (batch, offset) = decode(address);
        self.strategy
            .append_to(batch, offset, builder, output_channel_offset)
    }
}

impl fmt::Debug for JoinHashLookupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHashLookupSource")
            .field("strategy", &self.strategy)
            .field("key_types", &self.key_types)
            .field("positions", &self.addresses.len())
            .field("groups", &self.group_count)
            .field("capacity", &self.slots.len())
            .field("sorted", &self.sorted_groups.is_some())
            .field("null_safe_keys", &self.null_safe_keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colbatch_test_utils::{int64_batch, keyed_batch, keyed_types};

    #[test]
    fn table_always_has_a_free_slot() {
        assert_eq!(table_capacity(0, 0.75), 1);
        assert_eq!(table_capacity(3, 1.0), 4);
        assert_eq!(table_capacity(4, 1.0), 8);
        assert_eq!(table_capacity(6, 0.75), 16);
    }

    #[test]
    fn groups_equal_keys() {
        let mut index = BatchIndex::new(keyed_types(), 6).unwrap();
        index
            .add_batch(&keyed_batch(
                &[Some(1), Some(2), None, Some(2), Some(1), Some(3)],
                &[Some("a"), Some("b"), Some("c"), Some("d"), Some("e"), Some("f")],
            ))
            .unwrap();
        let source = JoinHashLookupSource::try_new(&index, LookupSourceOptions::new(vec![0])).unwrap();
        assert_eq!(source.group_count(), 3);
        assert_eq!(source.join_position_count(), 6);
        assert_eq!(source.links[1], 3);
        assert_eq!(source.links[0], 4);
        assert_eq!(source.links[2], EMPTY);

        let null_safe = JoinHashLookupSource::try_new(
            &index,
            LookupSourceOptions::new(vec![0]).with_null_safe_keys(true),
        )
        .unwrap();
        assert_eq!(null_safe.group_count(), 4);
    }

    #[test]
    fn sorted_groups_follow_the_sort_channel() {
        let mut index = BatchIndex::new(keyed_types(), 4).unwrap();
        index
            .add_batch(&keyed_batch(
                &[Some(7), Some(7), Some(7), Some(7)],
                &[Some("d"), None, Some("b"), Some("c")],
            ))
            .unwrap();
        let source = JoinHashLookupSource::try_new(
            &index,
            LookupSourceOptions::new(vec![0]).with_sort_channel(1),
        )
        .unwrap();
        let probe_batch = int64_batch(&[7]);
        let probe = JoinProbe::try_new(&probe_batch, vec![0], None).unwrap();
        let mut order = Vec::new();
        let mut next = source.get_join_position(&probe, 0);
        while let Some(position) = next {
            order.push(position);
            next = source.get_next_join_position(position, &probe, 0);
        }
        // Null sort values go last.
        assert_eq!(order, vec![2, 3, 0, 1]);
    }

    #[test]
    fn empty_index_finds_nothing() {
        let index = BatchIndex::new(vec![DataType::Int64], 0).unwrap();
        let source = JoinHashLookupSource::try_new(&index, LookupSourceOptions::new(vec![0])).unwrap();
        assert!(source.is_empty());
        let probe_batch = int64_batch(&[1]);
        let probe = JoinProbe::try_new(&probe_batch, vec![0], None).unwrap();
        assert_eq!(source.get_join_position(&probe, 0), None);
        assert!(source.in_memory_size_in_bytes() > 0);
    }
}
