use arrow::datatypes::DataType;
use std::fmt;
use thiserror::Error;

/// Unified error type for all colbatch operations.
///
/// Operations validate their inputs before mutating any state, so an `Err`
/// always means the receiver is unchanged and still usable.
#[derive(Error, Debug)]
pub enum Error {
    /// Arrow library error during columnar data operations.
    ///
    /// Raised when building arrays or record batches from appended values,
    /// when converting sort keys into the row format, or when gathering rows
    /// across batches.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Invalid API parameter or broken caller contract.
    ///
    /// This covers:
    /// - Channel indices outside the index's column list
    /// - Comparing or joining channels of different types
    /// - Batches whose column count or types do not match the index
    /// - Sort ranges outside `[0, position_count]`
    ///
    /// The receiver is left untouched; fix the input and retry.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// A hard resource limit would be exceeded.
    ///
    /// The batch index refuses to grow past its fixed row cap or past the
    /// range of its synthetic addresses. This is fatal to the calling operator.
    #[error("Insufficient resources: {0}")]
    InsufficientResources(String),

    /// A column type that has no registered type operators.
    #[error("Unsupported column type: {0}")]
    UnsupportedType(DataType),

    /// Specialized strategy generation failed.
    ///
    /// Only observed internally: the lookup-source builder logs it and
    /// continues with the interpreted strategy.
    #[error("strategy compilation failed: {0}")]
    Compilation(String),

    /// Internal error indicating a bug or unexpected state.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create an [`Error::Compilation`] from any displayable value.
    ///
    /// # Examples
    ///
    /// ```
    /// use colbatch_result::Error;
    ///
    /// let err = Error::compilation("no kernel for Boolean keys");
    /// assert!(matches!(err, Error::Compilation(msg) if msg.contains("Boolean")));
    /// ```
    #[inline]
    pub fn compilation<E: fmt::Display>(err: E) -> Self {
        Error::Compilation(err.to_string())
    }
}
