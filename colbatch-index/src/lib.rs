//! In-memory batch index.
//!
//! A [`BatchIndex`] accumulates Arrow record batches produced upstream and
//! exposes every row through a logical order of synthetic addresses. Operators
//! sort that order in place, read values by logical position, stream rows back
//! out, or derive hash strategies for building join lookup sources.
//!
//! ```
//! use arrow::array::{ArrayRef, Int64Array};
//! use arrow::datatypes::DataType;
//! use arrow::record_batch::RecordBatch;
//! use colbatch_index::{BatchIndexFactory, SortOrder};
//! use std::sync::Arc;
//!
//! let factory = BatchIndexFactory::default();
//! let mut index = factory.new_batch_index(vec![DataType::Int64], 3).unwrap();
//! let column: ArrayRef = Arc::new(Int64Array::from(vec![3, 1, 2]));
//! let batch = RecordBatch::try_new(index.schema(), vec![column]).unwrap();
//! index.add_batch(&batch).unwrap();
//!
//! index.sort(&[0], &[SortOrder::AscNullsLast]).unwrap();
//! assert_eq!(index.get_long(0, 0).unwrap(), 1);
//! ```
#![forbid(unsafe_code)]

pub mod address;
mod batch_builder;
mod comparator;
mod config;
mod factory;
mod index;
mod iter;
pub mod ordering;
pub mod strategy;
pub mod types;

pub use address::{
    decode_batch_index, decode_position, decode_synthetic_address, encode_synthetic_address,
};
pub use batch_builder::{
    BatchBuilder, DEFAULT_MAX_BATCH_BYTES, DEFAULT_MAX_BATCH_ROWS, channel_schema,
};
pub use comparator::ChannelComparator;
pub use config::BatchIndexConfig;
pub use factory::BatchIndexFactory;
pub use index::{BatchIndex, MAX_POSITIONS, compact_array};
pub use iter::{Batches, SortedBatches};
pub use ordering::{OrderingCompiler, PositionOrdering};
pub use strategy::{
    CompiledHashStrategy, CompiledStrategyFactory, HashStrategy, HashStrategyOptions,
    InterpretedHashStrategy, JoinCompiler,
};
pub use types::{SortOrder, ValueKind, combine_hash, envelope_coordinates, hash_row};
