//! Filter model for Loam cell-pass queries.
//!
//! Filters are pure value objects built per request from wire input:
//! a [`SpatialFilter`] restricting which ground the request covers, an
//! [`AttributeFilter`] restricting which passes within that ground
//! count, and a [`FilterSet`] pairing them up (with base/top pairs for
//! between-filter volumes). A one-time preparation step converts WGS84
//! coordinates to grid units and resolves alignment boundary fences;
//! after preparation a filter is treated as immutable for the rest of
//! the request.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod attribute;
pub mod codec;
pub mod error;
pub mod fence;
pub mod filter_set;
pub mod spatial;

pub use attribute::{AttributeFilter, ElevationMode, ElevationRangeSource};
pub use error::FilterError;
pub use fence::{Fence, FencePoint};
pub use filter_set::{CombinedFilter, FilterSet};
pub use spatial::{
    ConversionError, CoordinateConversion, DesignBoundaryResolver, SpatialFilter,
    SpatialSelection,
};
