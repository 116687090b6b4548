//! Application Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An application error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for a whole invocation.
pub type Result<T> = std::result::Result<T, Error>;

/// What stopped the invocation, phrased for the user.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration error: {_0}")]
    Config(#[error(not(source))] String),
    #[display("no scanner found")]
    NotFound,
    #[display("scanner discovery failed")]
    Discovery,
    #[display("could not connect to {_0}")]
    Connect(#[error(not(source))] String),
    #[display("{_0}")]
    Session(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
