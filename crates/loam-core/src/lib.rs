//! Core types for the Loam spatial cell-pass data engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental vocabulary used throughout the Loam workspace:
//! strongly-typed identifiers, the UTC timestamp type, the cell-pass
//! measurement record with its per-attribute null sentinels, and the
//! shared typed statuses returned by external collaborators.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cellpass;
pub mod id;
pub mod status;
pub mod time;

pub use cellpass::{
    CellPass, GpsMode, PassType, TravelDirection, VibrationState, NULL_CCA, NULL_CCV,
    NULL_GPS_ACCURACY, NULL_HEIGHT, NULL_MDP, NULL_SPEED, NULL_TEMPERATURE,
};
pub use id::{AlignmentId, DesignId, MachineId, ProjectId, SurveyedSurfaceId};
pub use status::{DesignLookup, QueryTermination};
pub use time::Timestamp;
