//! Cooperative abort for long-running pipelines.
//!
//! Pipelines check the token between sub grid batches, never mid-cell.
//! Cancellation and timeout are distinct signals; the first one to land
//! wins and later signals do not overwrite it, so the reported terminal
//! status always names the original cause.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::QueryError;

const LIVE: u8 = 0;
const CANCELLED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// Why a request was aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// Aborted by request cancellation.
    Cancelled,
    /// Aborted because the request deadline elapsed.
    TimedOut,
}

/// Shared abort signal for one request.
///
/// Clones share the signal; any holder may signal, every holder
/// observes it.
#[derive(Clone, Debug, Default)]
pub struct AbortToken {
    state: Arc<AtomicU8>,
}

impl AbortToken {
    /// A live token.
    pub fn new() -> Self {
        Self::default()
    }

    fn signal(&self, state: u8) {
        // First signal wins.
        let _ = self
            .state
            .compare_exchange(LIVE, state, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Signal cancellation by the caller.
    pub fn cancel(&self) {
        self.signal(CANCELLED);
    }

    /// Signal that the request deadline elapsed.
    pub fn time_out(&self) {
        self.signal(TIMED_OUT);
    }

    /// Whether the token has been signalled.
    pub fn is_aborted(&self) -> bool {
        self.state.load(Ordering::Acquire) != LIVE
    }

    /// The abort reason, when signalled.
    pub fn reason(&self) -> Option<AbortReason> {
        match self.state.load(Ordering::Acquire) {
            CANCELLED => Some(AbortReason::Cancelled),
            TIMED_OUT => Some(AbortReason::TimedOut),
            _ => None,
        }
    }

    /// Abort checkpoint: an error when signalled, `Ok` otherwise.
    pub fn check(&self) -> Result<(), QueryError> {
        match self.reason() {
            None => Ok(()),
            Some(AbortReason::Cancelled) => Err(QueryError::Cancelled),
            Some(AbortReason::TimedOut) => Err(QueryError::TimedOut),
        }
    }
}
