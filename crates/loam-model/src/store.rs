//! The persistent store seam.
//!
//! The engine never talks to storage directly; it reads and writes named
//! byte streams keyed by project, stream name and stream kind. Backends
//! range from an in-memory map in tests to a remote blob store in
//! production.

use loam_core::ProjectId;

use crate::error::StoreError;

/// What a persisted stream contains. The kind participates in the
/// stream key, so identically named streams of different kinds never
/// collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Site model identity and metadata.
    SiteModelMetadata,
    /// The project's coordinate system blob.
    CoordinateSystem,
    /// The production data existence map.
    ExistenceMap,
    /// The machine list.
    Machines,
    /// Per-machine target value series.
    MachineTargets,
    /// The design list.
    Designs,
    /// The surveyed surface list.
    SurveyedSurfaces,
    /// The alignment list.
    Alignments,
    /// The proofing run list.
    ProofingRuns,
    /// Cell pass data for one leaf sub grid.
    CellPassData,
}

/// Byte-stream persistence keyed by (project, name, kind).
pub trait PersistentStore: Send + Sync {
    /// Read a stream, or `None` when it has never been written.
    fn read_stream(
        &self,
        project: ProjectId,
        name: &str,
        kind: StreamKind,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write (or overwrite) a stream.
    fn write_stream(
        &self,
        project: ProjectId,
        name: &str,
        kind: StreamKind,
        data: &[u8],
    ) -> Result<(), StoreError>;

    /// Remove a stream. Removing an absent stream is not an error.
    fn remove_stream(
        &self,
        project: ProjectId,
        name: &str,
        kind: StreamKind,
    ) -> Result<(), StoreError>;
}

/// Well-known stream names for a site model's own streams.
pub mod stream_names {
    /// Site model metadata stream.
    pub const METADATA: &str = "metadata";
    /// Coordinate system blob stream.
    pub const COORDINATE_SYSTEM: &str = "csib";
    /// Production data existence map stream.
    pub const EXISTENCE_MAP: &str = "existence-map";
    /// Machine list stream.
    pub const MACHINES: &str = "machines";
    /// Machine target values stream.
    pub const MACHINE_TARGETS: &str = "machine-targets";
    /// Design list stream.
    pub const DESIGNS: &str = "designs";
    /// Surveyed surface list stream.
    pub const SURVEYED_SURFACES: &str = "surveyed-surfaces";
    /// Alignment list stream.
    pub const ALIGNMENTS: &str = "alignments";
    /// Proofing run list stream.
    pub const PROOFING_RUNS: &str = "proofing-runs";
}
