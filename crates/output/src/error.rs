//! Output Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An output error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for output operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why pages could not be filed.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A scan produced nothing to file.
    #[display("no pages to write")]
    NoPages,
    /// A page could not be decoded or re-encoded.
    #[display("could not encode page {_0}")]
    Encode(#[error(not(source))] usize),
    /// Pages could not be combined into one document.
    #[display("could not merge pages into a PDF")]
    Merge,
    #[display("could not create directory {}", _0.display())]
    CreateDirectory(#[error(not(source))] PathBuf),
    #[display("could not write {}", _0.display())]
    Copy(#[error(not(source))] PathBuf),
    #[display("could not create alias {}", _0.display())]
    Alias(#[error(not(source))] PathBuf),
    /// Some outputs were not (fully) written; the rest were.
    #[display("{failed} of {total} outputs failed")]
    Incomplete { failed: usize, total: usize },
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Filesystem writes are never retried: a partial output may already
    /// exist and a second attempt would pick a different name.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Incomplete { failed: 1, total: 3 }.to_string(), "1 of 3 outputs failed");
        assert_eq!(ErrorKind::CreateDirectory(PathBuf::from("/out/x")).to_string(), "could not create directory /out/x");
    }
}
