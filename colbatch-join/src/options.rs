use std::fmt;
use std::sync::Arc;

use colbatch_result::{Error, Result};

use crate::filter::{JoinFilterFunction, JoinFilterRef};
use crate::spatial::{Rectangle, SpatialPredicate};

/// Default fill ratio of the open-addressing hash table.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// How a hash lookup source is built over a batch index.
#[derive(Clone)]
pub struct LookupSourceOptions {
    pub join_channels: Vec<usize>,
    /// Channel holding a precomputed `Int64` or `UInt64` row hash.
    pub hash_channel: Option<usize>,
    /// Residual predicate checked by `is_join_position_eligible`.
    pub filter: Option<JoinFilterRef>,
    /// Orders the positions of each key group by this channel.
    pub sort_channel: Option<usize>,
    /// Range predicates over the sorted positions of a key group. Must be
    /// monotone in sort order: false for a prefix, then true. Only consulted
    /// when `sort_channel` is set.
    pub search_filters: Vec<JoinFilterRef>,
    /// Channels appended by `append_to`; every channel when `None`.
    pub output_channels: Option<Vec<usize>>,
    /// Treat null join keys as equal to each other.
    pub null_safe_keys: bool,
    pub load_factor: f64,
}

impl LookupSourceOptions {
    pub fn new(join_channels: Vec<usize>) -> Self {
        Self {
            join_channels,
            hash_channel: None,
            filter: None,
            sort_channel: None,
            search_filters: Vec::new(),
            output_channels: None,
            null_safe_keys: false,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }

    pub fn with_hash_channel(mut self, hash_channel: usize) -> Self {
        self.hash_channel = Some(hash_channel);
        self
    }

    pub fn with_filter(mut self, filter: impl JoinFilterFunction + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_sort_channel(mut self, sort_channel: usize) -> Self {
        self.sort_channel = Some(sort_channel);
        self
    }

    pub fn with_search_filter(mut self, filter: impl JoinFilterFunction + 'static) -> Self {
        self.search_filters.push(Arc::new(filter));
        self
    }

    pub fn with_output_channels(mut self, output_channels: Vec<usize>) -> Self {
        self.output_channels = Some(output_channels);
        self
    }

    pub fn with_null_safe_keys(mut self, null_safe_keys: bool) -> Self {
        self.null_safe_keys = null_safe_keys;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(Error::InvalidArgumentError(format!(
                "load factor must be in (0, 1], got {}",
                self.load_factor
            )));
        }
        if !self.search_filters.is_empty() && self.sort_channel.is_none() {
            return Err(Error::InvalidArgumentError(
                "search filters require a sort channel".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LookupSourceOptions {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for LookupSourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupSourceOptions")
            .field("join_channels", &self.join_channels)
            .field("hash_channel", &self.hash_channel)
            .field("has_filter", &self.filter.is_some())
            .field("sort_channel", &self.sort_channel)
            .field("search_filters", &self.search_filters.len())
            .field("output_channels", &self.output_channels)
            .field("null_safe_keys", &self.null_safe_keys)
            .field("load_factor", &self.load_factor)
            .finish()
    }
}

/// How a spatial index is built over a batch index.
#[derive(Clone)]
pub struct SpatialIndexOptions {
    /// Envelope channel of the build geometries.
    pub geometry_channel: usize,
    pub predicate: SpatialPredicate,
    /// `Float64` channel with the per-row distance for
    /// [`SpatialPredicate::DistanceWithin`].
    pub radius_channel: Option<usize>,
    /// `Int32` channel with the partition id of each build row. Set together
    /// with `partitions`.
    pub partition_channel: Option<usize>,
    /// Extent of every partition, indexed by partition id.
    pub partitions: Vec<Rectangle>,
    pub filter: Option<JoinFilterRef>,
    pub output_channels: Option<Vec<usize>>,
}

impl SpatialIndexOptions {
    pub fn new(geometry_channel: usize, predicate: SpatialPredicate) -> Self {
        Self {
            geometry_channel,
            predicate,
            radius_channel: None,
            partition_channel: None,
            partitions: Vec::new(),
            filter: None,
            output_channels: None,
        }
    }

    pub fn with_radius_channel(mut self, radius_channel: usize) -> Self {
        self.radius_channel = Some(radius_channel);
        self
    }

    pub fn with_partitions(mut self, partition_channel: usize, partitions: Vec<Rectangle>) -> Self {
        self.partition_channel = Some(partition_channel);
        self.partitions = partitions;
        self
    }

    pub fn with_filter(mut self, filter: impl JoinFilterFunction + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_output_channels(mut self, output_channels: Vec<usize>) -> Self {
        self.output_channels = Some(output_channels);
        self
    }
}

impl fmt::Debug for SpatialIndexOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialIndexOptions")
            .field("geometry_channel", &self.geometry_channel)
            .field("predicate", &self.predicate)
            .field("radius_channel", &self.radius_channel)
            .field("partition_channel", &self.partition_channel)
            .field("partitions", &self.partitions.len())
            .field("has_filter", &self.filter.is_some())
            .field("output_channels", &self.output_channels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_bad_settings() {
        assert!(LookupSourceOptions::new(vec![0]).validate().is_ok());
        assert!(
            LookupSourceOptions::new(vec![0])
                .with_load_factor(0.0)
                .validate()
                .is_err()
        );
        assert!(
            LookupSourceOptions::new(vec![0])
                .with_load_factor(1.5)
                .validate()
                .is_err()
        );
        let unsorted = LookupSourceOptions::new(vec![0])
            .with_search_filter(|_: crate::BuildRow<'_>, _: usize, _: &arrow::record_batch::RecordBatch| true);
        assert!(unsorted.validate().is_err());
        assert!(unsorted.with_sort_channel(1).validate().is_ok());
    }
}
