//! Typed statuses shared across crate boundaries.

use std::fmt;

/// Result of an external design lookup (boundary fence or per-cell
/// elevation patch).
///
/// `NoElevationsInRequestedPatch` is the one benign non-value outcome:
/// the design simply has no coverage over the requested region. What it
/// means depends on the call site; filter preparation treats it as a
/// failure while sub grid traversal treats it as an empty contribution.
#[derive(Clone, Debug, PartialEq)]
pub enum DesignLookup<T> {
    /// The lookup succeeded.
    Value(T),
    /// The design has no elevations over the requested region.
    NoElevationsInRequestedPatch,
    /// The lookup failed for any other reason.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl<T> DesignLookup<T> {
    /// Whether this outcome is the benign "no coverage" case.
    pub fn is_empty_patch(&self) -> bool {
        matches!(self, Self::NoElevationsInRequestedPatch)
    }
}

/// Terminal status of a long-running query pipeline.
///
/// Cancellation and timeout are distinct from each other and from
/// ordinary failure; callers dispatch on all four.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryTermination {
    /// The pipeline ran to completion.
    Completed,
    /// Aborted by request cancellation.
    Cancelled,
    /// Aborted because the request deadline elapsed.
    TimedOut,
    /// Failed with an error.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for QueryTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}
