//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a project (one site model per project).
///
/// Projects are identified by a 128-bit UUID assigned by the master-data
/// system; Loam treats the value as opaque.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub u128);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<u128> for ProjectId {
    fn from(v: u128) -> Self {
        Self(v)
    }
}

/// Identifies a machine within a project.
///
/// Machines are registered on first ingest and assigned sequential
/// internal IDs; `MachineId(n)` indexes the project's machine list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(pub u16);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for MachineId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// Identifies an imported design surface within a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DesignId(pub u32);

impl fmt::Display for DesignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DesignId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies an alignment (road centerline) within a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlignmentId(pub u32);

impl fmt::Display for AlignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AlignmentId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a surveyed (as-built) surface within a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurveyedSurfaceId(pub u32);

impl fmt::Display for SurveyedSurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SurveyedSurfaceId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
