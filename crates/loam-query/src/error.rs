//! Query pipeline error type.

use std::error::Error;
use std::fmt;

use loam_core::QueryTermination;
use loam_filter::FilterError;
use loam_model::ModelError;

/// Errors raised by the profiling and volumes pipelines.
#[derive(Debug)]
pub enum QueryError {
    /// The request was cancelled by its caller.
    Cancelled,
    /// The request deadline elapsed.
    TimedOut,
    /// Filter validation or preparation failed.
    Filter(FilterError),
    /// Loading site model data failed.
    Model(ModelError),
    /// A design boundary or elevation lookup failed (beyond the benign
    /// "no elevations in patch" case).
    DesignLookupFailed {
        /// Resolver-supplied description of the failure.
        reason: String,
    },
    /// A path produced more grid intercepts than the safety cap allows.
    TooManyIntercepts {
        /// The number of intercepts the path would have produced.
        found: usize,
        /// The cap that was exceeded.
        cap: usize,
    },
    /// Any other pipeline failure.
    Failed {
        /// What went wrong.
        detail: String,
    },
}

impl QueryError {
    /// The terminal status this error maps to.
    pub fn termination(&self) -> QueryTermination {
        match self {
            Self::Cancelled => QueryTermination::Cancelled,
            Self::TimedOut => QueryTermination::TimedOut,
            other => QueryTermination::Failed {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "request cancelled"),
            Self::TimedOut => write!(f, "request timed out"),
            Self::Filter(err) => write!(f, "filter error: {err}"),
            Self::Model(err) => write!(f, "site model error: {err}"),
            Self::DesignLookupFailed { reason } => {
                write!(f, "design lookup failed: {reason}")
            }
            Self::TooManyIntercepts { found, cap } => {
                write!(f, "profile path produced {found} grid intercepts (cap {cap})")
            }
            Self::Failed { detail } => write!(f, "query failed: {detail}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Filter(err) => Some(err),
            Self::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FilterError> for QueryError {
    fn from(err: FilterError) -> Self {
        Self::Filter(err)
    }
}

impl From<ModelError> for QueryError {
    fn from(err: ModelError) -> Self {
        Self::Model(err)
    }
}
