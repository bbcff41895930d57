//! Site model aggregate, lifecycle cache and persistence for Loam.
//!
//! A [`SiteModel`] is the per-project aggregate root: identity and
//! configuration, the production data tree, the existence map and the
//! event-history collections, each lazily loaded from a
//! [`PersistentStore`] on first access. Published models are immutable
//! snapshots; ingest notifications build replacements that share every
//! unaffected collection with the prior instance. The
//! [`SiteModelRegistry`] is the process-wide cache that swaps those
//! replacements in without ever blocking readers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod events;
pub mod lazy;
pub mod registry;
pub mod sitemodel;
pub mod store;

pub use error::{ModelError, StoreError};
pub use events::{
    AlignmentList, AlignmentRecord, DesignList, DesignRecord, MachineList, MachineRecord,
    MachineTargetValues, ProofingRunList, ProofingRunRecord, SurveyedSurfaceList,
    SurveyedSurfaceRecord, TargetValueList, TargetValueStore,
};
pub use lazy::LazyLoad;
pub use registry::{ChangeNotification, NotificationPump, SiteModelRegistry};
pub use sitemodel::{SiteModel, SiteModelChange};
pub use store::{stream_names, PersistentStore, StreamKind};
