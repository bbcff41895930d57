//! Sparse sub grid tree storage and existence maps for Loam.
//!
//! This crate holds the spatial storage core: a fixed-fan-out,
//! address-indexed tree of 32×32 sub grids ([`SubGridTree`]), the
//! bit-per-cell plane used for presence testing ([`SubGridBitMask`]), the
//! [`ExistenceMap`] specialization that answers "is there any data under
//! this region" without touching payload, and the bounding-extent value
//! types shared by every query layer.
//!
//! Trees are cheap to clone: child slots are reference counted, so a
//! cloned tree shares every sub grid with its source and mutation copies
//! only the touched root-to-leaf path. The site model layer builds its
//! copy-on-notify snapshots directly on this property.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod address;
pub mod bitmask;
pub mod error;
pub mod existence;
pub mod extents;
pub mod io;
pub mod passes;
pub mod tree;

pub use address::{CellAddress, CELLS_PER_SUB_GRID, DIMENSION, SUB_GRID_INDEX_BITS};
pub use bitmask::SubGridBitMask;
pub use error::GridError;
pub use existence::ExistenceMap;
pub use extents::{BoundingExtents3D, BoundingIntegerExtents2D};
pub use passes::CellPassLeaf;
pub use tree::{LeafSubGrid, SubGridTree};
