//! Profiling and volumes query pipeline for Loam site models.
//!
//! A request arrives with a site model reference and a filter set. The
//! pipeline prunes non-populated regions through the existence map,
//! builds a per-sub-grid cell inclusion mask from the spatial
//! restrictions, then walks each included cell's pass history: grouping
//! passes into lifts, summarizing layer stacks along a profile line, or
//! accumulating cut/fill volumes between two surfaces. Long-running
//! computations honor a cooperative [`AbortToken`] checked between sub
//! grid batches.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod abort;
pub mod analyzer;
pub mod error;
pub mod layers;
pub mod mask;
pub mod profile;
pub mod volumes;

pub use abort::{AbortReason, AbortToken};
pub use analyzer::{AnalyzedCell, CellProfileAnalyzer};
pub use error::QueryError;
pub use layers::{
    build_layers, summarize_layers, ElevationDeclineDetector, Layer, LayerStackSummary,
    LiftDetector, SingleLayerDetector, TargetThicknessDetector,
};
pub use mask::{build_inclusion_mask, DesignElevationResolver, ElevationPatch, InclusionMask};
pub use profile::{
    AllSubGrids, CellProfileBuilder, PathVertex, ProfileCell, SubGridOwnership, MAX_INTERCEPTS,
};
pub use volumes::{
    progressive_series, VolumeSurface, VolumesAggregator, VolumesCalculator,
};
