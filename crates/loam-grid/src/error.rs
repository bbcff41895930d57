//! Error types for grid storage and persistence.

use std::error::Error;
use std::fmt;
use std::io;

/// Errors from the grid binary codec.
#[derive(Debug)]
pub enum GridError {
    /// Underlying I/O failure (includes truncated streams).
    Io(io::Error),
    /// The stream does not start with the expected magic bytes.
    InvalidMagic,
    /// The stream carries a format version this build cannot read.
    ///
    /// Version mismatches are fatal deserialization errors, never
    /// silently ignored.
    UnsupportedVersion {
        /// The version this build writes and reads.
        expected: u8,
        /// The version found in the stream.
        found: u8,
    },
    /// Structurally invalid content (e.g. a leaf origin that is not
    /// sub-grid aligned).
    Malformed {
        /// Human-readable description of the problem.
        detail: String,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes"),
            Self::UnsupportedVersion { expected, found } => {
                write!(f, "unsupported format version: expected {expected}, found {found}")
            }
            Self::Malformed { detail } => write!(f, "malformed stream: {detail}"),
        }
    }
}

impl Error for GridError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for GridError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
