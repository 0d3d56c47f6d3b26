//! Positions appenders: growable, type-specialized output columns.
//!
//! An operator that emits a subset of its input rows (a partitioner, a
//! filter, the sorted output of a batch index) hands each appender a source
//! column plus the positions it selected. The appender copies those values
//! into its own buffers and, on [`PositionsAppender::build`], returns them as
//! a fresh Arrow array before resetting for the next output batch.
//!
//! The set of representations is closed: fixed-width primitives share one
//! generic implementation, booleans and variable-width byte strings have
//! their own, and every other Arrow type goes through the gathering
//! [`GenericPositionsAppender`].
//!
//! ```
//! use arrow::array::{Array, Int64Array};
//! use arrow::datatypes::DataType;
//! use colbatch_appender::PositionsAppender;
//!
//! let source = Int64Array::from(vec![10, 20, 30]);
//! let mut appender = PositionsAppender::new(&DataType::Int64, 16);
//! appender.append(&[2, 0], &source).unwrap();
//! let built = appender.build().unwrap();
//! assert_eq!(built.len(), 2);
//! ```
#![forbid(unsafe_code)]

mod boolean;
mod bytes;
mod generic;
mod primitive;
mod run;
pub mod sizing;

pub use boolean::BooleanPositionsAppender;
pub use bytes::BytesPositionsAppender;
pub use generic::GenericPositionsAppender;
pub use primitive::PrimitivePositionsAppender;

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type,
    Int64Type, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use colbatch_result::Result;

/// Type-specialized positions appender.
#[derive(Debug)]
pub enum PositionsAppender {
    Boolean(BooleanPositionsAppender),
    Int8(PrimitivePositionsAppender<Int8Type>),
    Int16(PrimitivePositionsAppender<Int16Type>),
    Int32(PrimitivePositionsAppender<Int32Type>),
    Int64(PrimitivePositionsAppender<Int64Type>),
    UInt8(PrimitivePositionsAppender<UInt8Type>),
    UInt16(PrimitivePositionsAppender<UInt16Type>),
    UInt32(PrimitivePositionsAppender<UInt32Type>),
    UInt64(PrimitivePositionsAppender<UInt64Type>),
    Float32(PrimitivePositionsAppender<Float32Type>),
    Float64(PrimitivePositionsAppender<Float64Type>),
    Date32(PrimitivePositionsAppender<Date32Type>),
    Date64(PrimitivePositionsAppender<Date64Type>),
    Bytes(BytesPositionsAppender),
    Generic(GenericPositionsAppender),
}

macro_rules! dispatch {
    ($self:expr, $appender:ident => $body:expr) => {
        match $self {
            PositionsAppender::Boolean($appender) => $body,
            PositionsAppender::Int8($appender) => $body,
            PositionsAppender::Int16($appender) => $body,
            PositionsAppender::Int32($appender) => $body,
            PositionsAppender::Int64($appender) => $body,
            PositionsAppender::UInt8($appender) => $body,
            PositionsAppender::UInt16($appender) => $body,
            PositionsAppender::UInt32($appender) => $body,
            PositionsAppender::UInt64($appender) => $body,
            PositionsAppender::Float32($appender) => $body,
            PositionsAppender::Float64($appender) => $body,
            PositionsAppender::Date32($appender) => $body,
            PositionsAppender::Date64($appender) => $body,
            PositionsAppender::Bytes($appender) => $body,
            PositionsAppender::Generic($appender) => $body,
        }
    };
}

impl PositionsAppender {
    /// Create the appender variant specialized for `data_type`.
    ///
    /// `expected_entries` sizes the first allocation of the first build cycle.
    pub fn new(data_type: &DataType, expected_entries: usize) -> Self {
        match data_type {
            DataType::Boolean => Self::Boolean(BooleanPositionsAppender::new(expected_entries)),
            DataType::Int8 => Self::Int8(PrimitivePositionsAppender::new(expected_entries)),
            DataType::Int16 => Self::Int16(PrimitivePositionsAppender::new(expected_entries)),
            DataType::Int32 => Self::Int32(PrimitivePositionsAppender::new(expected_entries)),
            DataType::Int64 => Self::Int64(PrimitivePositionsAppender::new(expected_entries)),
            DataType::UInt8 => Self::UInt8(PrimitivePositionsAppender::new(expected_entries)),
            DataType::UInt16 => Self::UInt16(PrimitivePositionsAppender::new(expected_entries)),
            DataType::UInt32 => Self::UInt32(PrimitivePositionsAppender::new(expected_entries)),
            DataType::UInt64 => Self::UInt64(PrimitivePositionsAppender::new(expected_entries)),
            DataType::Float32 => Self::Float32(PrimitivePositionsAppender::new(expected_entries)),
            DataType::Float64 => Self::Float64(PrimitivePositionsAppender::new(expected_entries)),
            DataType::Date32 => Self::Date32(PrimitivePositionsAppender::new(expected_entries)),
            DataType::Date64 => Self::Date64(PrimitivePositionsAppender::new(expected_entries)),
            other => match BytesPositionsAppender::try_new(other.clone(), expected_entries) {
                Ok(bytes) => Self::Bytes(bytes),
                Err(_) => Self::Generic(GenericPositionsAppender::new(other.clone())),
            },
        }
    }

    /// Copy `positions` of `source`, in order, to the end of the output.
    ///
    /// No-op for an empty position list. Fails without appending anything if
    /// `source` has a different type or a position is out of bounds.
    pub fn append(&mut self, positions: &[usize], source: &dyn Array) -> Result<()> {
        dispatch!(self, appender => appender.append(positions, source))
    }

    /// Append the single value represented by `source` `source.len()` times.
    ///
    /// `source` is either a run-end-encoded array or a constant column; only
    /// its first logical value is read.
    pub fn append_run(&mut self, source: &dyn Array) -> Result<()> {
        dispatch!(self, appender => appender.append_run(source))
    }

    /// Return everything appended since the previous build and reset.
    pub fn build(&mut self) -> Result<ArrayRef> {
        dispatch!(self, appender => appender.build())
    }

    /// Positions appended since the previous build.
    pub fn position_count(&self) -> usize {
        dispatch!(self, appender => appender.position_count())
    }

    /// Bytes currently held by the appender's buffers.
    pub fn retained_size_in_bytes(&self) -> usize {
        dispatch!(self, appender => appender.retained_size_in_bytes())
    }

    /// Logical bytes appended since the previous build.
    pub fn size_in_bytes(&self) -> usize {
        dispatch!(self, appender => appender.size_in_bytes())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::UInt8(_) => DataType::UInt8,
            Self::UInt16(_) => DataType::UInt16,
            Self::UInt32(_) => DataType::UInt32,
            Self::UInt64(_) => DataType::UInt64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::Date32(_) => DataType::Date32,
            Self::Date64(_) => DataType::Date64,
            Self::Bytes(appender) => appender.data_type().clone(),
            Self::Generic(appender) => appender.data_type().clone(),
        }
    }
}
