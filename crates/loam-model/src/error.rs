//! Model and persistence error types.

use std::error::Error;
use std::fmt;
use std::io;

use loam_grid::GridError;

/// A persistent store failure, as reported by the store backend.
#[derive(Debug)]
pub struct StoreError {
    /// What went wrong.
    pub detail: String,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persistent store error: {}", self.detail)
    }
}

impl Error for StoreError {}

/// Errors raised by site model loading, persistence and lifecycle.
#[derive(Debug)]
pub enum ModelError {
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
    /// A serialized timestamp carried a cleared UTC flag.
    TimesNotUtc,
    /// The persistent store reported a failure.
    Store(StoreError),
    /// Decoding an embedded grid stream failed.
    Grid(GridError),
    /// An operation requiring persistence ran on a transient model.
    NoPersistentStore,
    /// The store holds no metadata for the requested project.
    ProjectNotFound {
        /// The project that was requested.
        project: loam_core::ProjectId,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "i/o error: {err}"),
            Self::InvalidMagic => write!(f, "stream does not start with site model magic bytes"),
            Self::UnsupportedVersion { expected, found } => {
                write!(
                    f,
                    "unsupported site model format version {found} (expected {expected})"
                )
            }
            Self::Malformed { detail } => write!(f, "malformed site model stream: {detail}"),
            Self::TimesNotUtc => write!(f, "serialized site model time is not in UTC"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Grid(err) => write!(f, "grid stream error: {err}"),
            Self::NoPersistentStore => {
                write!(f, "operation requires a persistent store but the model is transient")
            }
            Self::ProjectNotFound { project } => {
                write!(f, "no site model metadata stored for project {project}")
            }
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Grid(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ModelError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<StoreError> for ModelError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<GridError> for ModelError {
    fn from(err: GridError) -> Self {
        Self::Grid(err)
    }
}
