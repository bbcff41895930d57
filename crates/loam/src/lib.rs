//! Loam: a spatial data engine for machine-generated cell pass
//! measurements.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Loam sub-crates. For most users, adding `loam` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use loam::prelude::*;
//!
//! // Stage a transient six-level model with one measured cell.
//! let mut model = SiteModel::transient(ProjectId(1), 6, 0.34);
//! let leaf = model.grid_mut().construct_leaf(1000, 2000);
//! leaf.add_pass(8, 16, CellPass::at(Timestamp::from_seconds(60), 2.5, MachineId(1)));
//! leaf.add_pass(8, 16, CellPass::at(Timestamp::from_seconds(120), 2.9, MachineId(1)));
//!
//! // Keep passes before t=100s, then take the newest surviving height.
//! let mut filter = AttributeFilter::new();
//! filter.set_time_range(Timestamp::MIN, Timestamp::from_seconds(100));
//! let history = model.grid().locate_leaf(1000, 2000).unwrap().passes(8, 16);
//! let filtered = filter.filter_passes(history, None);
//! assert_eq!(filter.select_elevation(&filtered), Some(2.5));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `loam-core` | IDs, timestamps, cell passes, null sentinels |
//! | [`grid`] | `loam-grid` | Sub grid tree, bitmasks, existence map, codecs |
//! | [`filter`] | `loam-filter` | Spatial/attribute filters, fences, filter sets |
//! | [`model`] | `loam-model` | Site model aggregate, registry, persistence |
//! | [`query`] | `loam-query` | Profiling and volumes pipelines, abort tokens |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and identifiers (`loam-core`).
///
/// Contains [`types::CellPass`], [`types::Timestamp`], the newtype IDs
/// and the null attribute sentinels.
pub use loam_core as types;

/// Spatial storage (`loam-grid`).
///
/// The sparse [`grid::SubGridTree`], per-sub-grid [`grid::SubGridBitMask`],
/// the [`grid::ExistenceMap`] and their binary codecs.
pub use loam_grid as grid;

/// The filter model (`loam-filter`).
///
/// Spatial selection ([`filter::SpatialFilter`], [`filter::Fence`]),
/// attribute predicates ([`filter::AttributeFilter`]) and ordered
/// [`filter::FilterSet`]s, with their wire codec.
pub use loam_filter as filter;

/// Site model aggregate and lifecycle (`loam-model`).
///
/// [`model::SiteModel`] snapshots, the copy-on-notify
/// [`model::SiteModelRegistry`] and the [`model::PersistentStore`] seam.
pub use loam_model as model;

/// Profiling and volumes pipelines (`loam-query`).
///
/// [`query::CellProfileBuilder`] and [`query::CellProfileAnalyzer`] for
/// profile lines, [`query::VolumesCalculator`] for cut/fill, all under a
/// cooperative [`query::AbortToken`].
pub use loam_query as query;

/// Common imports for typical Loam usage.
///
/// ```rust
/// use loam::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use loam_core::{
        CellPass, DesignId, DesignLookup, MachineId, ProjectId, QueryTermination, Timestamp,
    };

    // Grid
    pub use loam_grid::{CellAddress, ExistenceMap, SubGridBitMask, SubGridTree};

    // Filters
    pub use loam_filter::{
        AttributeFilter, CombinedFilter, Fence, FilterError, FilterSet, SpatialFilter,
    };

    // Site models
    pub use loam_model::{
        ModelError, PersistentStore, SiteModel, SiteModelChange, SiteModelRegistry,
    };

    // Queries
    pub use loam_query::{
        AbortToken, CellProfileAnalyzer, CellProfileBuilder, PathVertex, QueryError,
        VolumeSurface, VolumesCalculator,
    };
}
