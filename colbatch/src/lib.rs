//! colbatch: in-memory row-batch materialization over Arrow.
//!
//! This crate is the entrypoint of the colbatch workspace. It re-exports the
//! pieces a query operator needs to hold, reorder and join Arrow batches.
//!
//! # Quick Start
//!
//! Accumulate batches, sort them and read them back in order:
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Int64Array};
//! use arrow::record_batch::RecordBatch;
//! use colbatch::{BatchIndexFactory, SortOrder};
//!
//! let factory = BatchIndexFactory::default();
//! let mut index = factory.new_batch_index(vec![arrow::datatypes::DataType::Int64], 3).unwrap();
//! let keys: ArrayRef = Arc::new(Int64Array::from(vec![3, 1, 2]));
//! index.add_batch(&RecordBatch::try_new(index.schema(), vec![keys]).unwrap()).unwrap();
//! index.sort(&[0], &[SortOrder::AscNullsLast]).unwrap();
//! assert_eq!(index.get_long(0, 0).unwrap(), 1);
//! ```
//!
//! # Architecture
//!
//! - **Batch index** (`colbatch-index`): retained batches, synthetic row
//!   addresses, sorting, hash strategies and the strategy compilers.
//! - **Lookup sources** (`colbatch-join`): hash, sorted and spatial join
//!   structures built from an index snapshot.
//! - **Positions appenders** (`colbatch-appender`): type-specialised builders
//!   that gather selected rows into new arrays.
//! - **Errors** (`colbatch-result`): the shared [`Error`] type.

pub use colbatch_index::{
    BatchBuilder, BatchIndex, BatchIndexConfig, BatchIndexFactory, Batches, ChannelComparator,
    MAX_POSITIONS, SortOrder, SortedBatches, ValueKind,
};

pub use colbatch_join::{
    BatchIndexLookupExt, BuildRow, JoinFilterFunction, JoinHashLookupSource, JoinMatch, JoinProbe,
    LookupSource, LookupSourceOptions, Rectangle, SpatialIndex, SpatialIndexOptions,
    SpatialPredicate,
};

pub use colbatch_appender::PositionsAppender;

pub mod address {
    //! Synthetic row address codec.
    pub use colbatch_index::address::*;
}

pub mod strategy {
    //! Hash strategies and the compilers that produce them.
    pub use colbatch_index::strategy::*;
    pub use colbatch_index::{OrderingCompiler, PositionOrdering};
}

pub mod appender {
    //! Positions appender variants and sizing helpers.
    pub use colbatch_appender::*;
}

pub use colbatch_result::{Error, Result};
