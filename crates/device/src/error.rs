//! Device Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A device error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for device operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong while finding or talking to a scanner.
///
/// Faults the scanner itself reports travel as events instead.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No device matched the selector before discovery ended.
    #[display("no scanner was found")]
    NotFound,
    /// The discovery task itself failed (not merely "found nothing").
    #[display("device discovery failed")]
    Discovery,
    /// A discovered device could not be turned into a usable handle.
    #[display("could not connect to {_0}")]
    Connect(#[error(not(source))] String),
    /// A request could not even be issued to the device.
    #[display("device rejected request: {_0}")]
    Request(#[error(not(source))] &'static str),
    /// Raster bands did not add up to a well-formed page.
    #[display("band assembly failed: {_0}")]
    Assembly(#[error(not(source))] AssemblyFault),
    /// A page image could not be decoded or encoded.
    #[display("image conversion failed")]
    Image,
    #[display("I/O error")]
    Io,
}

/// Why a raster band was rejected by the [`BandAssembler`](crate::BandAssembler).
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum AssemblyFault {
    #[display("band at row {row} arrived with no page in progress")]
    NoActivePage { row: u32 },
    #[display("expected band starting at row {expected}, got row {found}")]
    OutOfOrder { expected: u32, found: u32 },
    #[display("page ended after {received} of {expected} bytes")]
    Truncated { received: u64, expected: u64 },
    #[display("band of {bytes} bytes overflows the declared page")]
    Overflow { bytes: u64 },
    #[display("band declares {declared} bytes but carries {actual}")]
    BandSize { declared: u64, actual: u64 },
    #[display("band layout differs from the page it continues")]
    LayoutMismatch,
    #[display("declared page layout is unusable")]
    InvalidLayout,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Device sessions are never retried automatically, so nothing here is.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::NotFound.to_string(), "no scanner was found");
        assert_eq!(
            ErrorKind::Assembly(AssemblyFault::OutOfOrder { expected: 64, found: 128 }).to_string(),
            "band assembly failed: expected band starting at row 64, got row 128"
        );
    }
}
