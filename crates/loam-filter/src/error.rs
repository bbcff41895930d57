//! Filter error type.

use std::error::Error;
use std::fmt;
use std::io;

/// Errors raised while building, preparing, or (de)serializing filters.
#[derive(Debug)]
pub enum FilterError {
    /// An underlying I/O operation failed.
    Io(io::Error),
    /// A stream did not open with the expected magic bytes.
    InvalidMagic,
    /// A stream carried a format version this build does not understand.
    UnsupportedVersion {
        /// The version this build reads and writes.
        expected: u8,
        /// The version found in the stream.
        found: u8,
    },
    /// A stream was structurally invalid beyond version mismatch.
    Malformed {
        /// What was wrong.
        detail: String,
    },
    /// A serialized time filter carried non-UTC timestamps.
    TimesNotUtc,
    /// A fence was given fewer than three vertices.
    TooFewFencePoints {
        /// How many vertices were supplied.
        found: usize,
    },
    /// An elevation range filter was enabled without a range source.
    InvalidElevationRange,
    /// WGS84 coordinates could not be converted to grid coordinates.
    FailedToConvertCoordinates {
        /// Converter-supplied description of the failure.
        reason: String,
    },
    /// An alignment boundary could not be resolved to a fence.
    BoundaryResolutionFailed {
        /// Resolver-supplied description of the failure.
        reason: String,
    },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "i/o error: {err}"),
            Self::InvalidMagic => write!(f, "stream does not start with filter magic bytes"),
            Self::UnsupportedVersion { expected, found } => {
                write!(f, "unsupported filter format version {found} (expected {expected})")
            }
            Self::Malformed { detail } => write!(f, "malformed filter stream: {detail}"),
            Self::TimesNotUtc => write!(f, "serialized time filter is not in UTC"),
            Self::TooFewFencePoints { found } => {
                write!(f, "fence requires at least 3 vertices, got {found}")
            }
            Self::InvalidElevationRange => {
                write!(f, "elevation range filter enabled without a range source")
            }
            Self::FailedToConvertCoordinates { reason } => {
                write!(f, "failed to convert filter coordinates to grid: {reason}")
            }
            Self::BoundaryResolutionFailed { reason } => {
                write!(f, "failed to resolve alignment boundary: {reason}")
            }
        }
    }
}

impl Error for FilterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FilterError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
