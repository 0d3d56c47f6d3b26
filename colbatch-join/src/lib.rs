//! Lookup sources built over a [`BatchIndex`] snapshot.
//!
//! A lookup source answers "which build rows match this probe row" for a join
//! operator. [`JoinHashLookupSource`] handles equi-joins (optionally with a
//! sort channel and range search filters for inequality conditions), and
//! [`SpatialIndex`] handles spatial joins over envelope channels.
//!
//! Both copy the channel list and the logical row order of the index when they
//! are built, so the index can be cleared and refilled right away:
//!
//! ```
//! use arrow::datatypes::DataType;
//! use colbatch_index::BatchIndex;
//! use colbatch_join::{BatchIndexLookupExt, JoinProbe, LookupSource};
//! use colbatch_test_utils::int64_batch;
//!
//! let mut index = BatchIndex::new(vec![DataType::Int64], 3).unwrap();
//! index.add_batch(&int64_batch(&[1, 2, 2])).unwrap();
//! let source = index.create_lookup_source(&[0]).unwrap();
//! index.clear();
//!
//! let probe_batch = int64_batch(&[2, 5]);
//! let probe = JoinProbe::try_new(&probe_batch, vec![0], None).unwrap();
//! let matches = source.join_matches(&probe).unwrap();
//! assert_eq!(matches.len(), 2);
//! ```
#![forbid(unsafe_code)]

mod filter;
mod hash;
mod lookup;
mod options;
mod probe;
pub mod spatial;

pub use filter::{BuildRow, JoinFilterFunction, JoinFilterRef};
pub use hash::JoinHashLookupSource;
pub use lookup::LookupSource;
pub use options::{DEFAULT_LOAD_FACTOR, LookupSourceOptions, SpatialIndexOptions};
pub use probe::{JoinMatch, JoinProbe};
pub use spatial::{Rectangle, SpatialIndex, SpatialPredicate};

use colbatch_index::BatchIndex;
use colbatch_result::Result;

/// Lookup-source construction on [`BatchIndex`].
pub trait BatchIndexLookupExt {
    /// Hash lookup source over `join_channels` with default options.
    fn create_lookup_source(&self, join_channels: &[usize]) -> Result<JoinHashLookupSource>;

    fn create_lookup_source_with(
        &self,
        options: LookupSourceOptions,
    ) -> Result<JoinHashLookupSource>;

    fn create_spatial_index(&self, options: SpatialIndexOptions) -> Result<SpatialIndex>;
}

impl BatchIndexLookupExt for BatchIndex {
    fn create_lookup_source(&self, join_channels: &[usize]) -> Result<JoinHashLookupSource> {
        self.create_lookup_source_with(LookupSourceOptions::new(join_channels.to_vec()))
    }

    fn create_lookup_source_with(
        &self,
        options: LookupSourceOptions,
    ) -> Result<JoinHashLookupSource> {
        JoinHashLookupSource::try_new(self, options)
    }

    fn create_spatial_index(&self, options: SpatialIndexOptions) -> Result<SpatialIndex> {
        SpatialIndex::try_new(self, options)
    }
}
