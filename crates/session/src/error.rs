//! Session Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A session error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a session ended in failure.
///
/// Every kind is terminal for the session; none is retried.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not open a session with the scanner: {_0}")]
    OpenSession(#[error(not(source))] String),
    #[display("scanner could not select the requested unit: {_0}")]
    UnitSelection(#[error(not(source))] String),
    /// The device reported an error outside of any specific request.
    #[display("scanner error: {_0}")]
    Device(#[error(not(source))] String),
    /// A scan request completed with an error.
    #[display("scan failed: {_0}")]
    Scan(#[error(not(source))] String),
    /// Memory-transfer bands did not form a valid page.
    #[display("received a malformed page: {_0}")]
    Assembly(#[error(not(source))] String),
    #[display("scanner was removed")]
    Removed,
    #[display("scanner closed the session unexpectedly")]
    UnexpectedClose,
    /// Nothing was heard from the device for too long.
    #[display("scanner stopped responding")]
    Timeout,
    /// The device's event channel closed.
    #[display("lost connection to the scanner")]
    Disconnected,
    /// A request could not even be sent.
    #[display("could not send {_0} request to the scanner")]
    Request(#[error(not(source))] &'static str),
    /// Scanning succeeded but the pages could not be written.
    #[display("could not write the scanned pages")]
    Output,
    #[display("could not create a scratch directory")]
    Scratch,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Device sessions are never retried automatically.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
