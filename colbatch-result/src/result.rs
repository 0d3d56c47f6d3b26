use crate::error::Error;

/// Result type alias used throughout colbatch.
pub type Result<T> = std::result::Result<T, Error>;
