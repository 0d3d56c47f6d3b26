//! Error types and result definitions for the colbatch crates.
//!
//! Every crate in the workspace reports failures through the single [`Error`]
//! enum and the [`Result<T>`] alias so errors propagate across crate
//! boundaries with `?` and can be matched structurally by callers.
//!
//! # Error Categories
//!
//! - **Data format errors** ([`Error::Arrow`]): Arrow array or batch construction failures
//! - **Contract violations** ([`Error::InvalidArgumentError`]): bad channel indices,
//!   mismatched channel types, malformed batches or ranges
//! - **Resource exhaustion** ([`Error::InsufficientResources`]): row capacity exceeded
//! - **Unsupported column types** ([`Error::UnsupportedType`])
//! - **Strategy compilation failures** ([`Error::Compilation`]): never surfaced by the
//!   lookup-source builder, which downgrades them to the interpreted strategy
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
