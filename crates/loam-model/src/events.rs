//! Event-history collections owned by a site model.
//!
//! Each collection is loaded independently from its own persisted
//! stream. Target values are time-ordered series queried with "the value
//! in force at time T" semantics: the most recent entry at or before T
//! wins, and an empty series answers nothing rather than a default.

use indexmap::IndexMap;
use loam_core::{AlignmentId, DesignId, MachineId, SurveyedSurfaceId, Timestamp};
use loam_grid::BoundingExtents3D;

/// One machine known to the project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineRecord {
    /// The machine's id within the project.
    pub id: MachineId,
    /// Display name.
    pub name: String,
}

/// The project's machines, iteration-ordered by insertion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MachineList {
    machines: IndexMap<MachineId, MachineRecord>,
}

impl MachineList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a machine record.
    pub fn add(&mut self, record: MachineRecord) {
        self.machines.insert(record.id, record);
    }

    /// Look up a machine by id.
    pub fn get(&self, id: MachineId) -> Option<&MachineRecord> {
        self.machines.get(&id)
    }

    /// All machines in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MachineRecord> {
        self.machines.values()
    }

    /// Number of machines.
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

/// A time-ordered series of target values for one machine setting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TargetValueList<V> {
    entries: Vec<(Timestamp, V)>,
}

impl<V> TargetValueList<V> {
    /// An empty series.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert a value taking effect at `time`, keeping the series
    /// chronologically ordered. Equal-time entries keep insertion order,
    /// so a later insert at the same instant supersedes an earlier one.
    pub fn insert(&mut self, time: Timestamp, value: V) {
        let at = self.entries.partition_point(|(t, _)| *t <= time);
        self.entries.insert(at, (time, value));
    }

    /// The value in force at `time`: the most recent entry at or before
    /// it, or `None` when the series starts later.
    pub fn value_at(&self, time: Timestamp) -> Option<&V> {
        let at = self.entries.partition_point(|(t, _)| *t <= time);
        at.checked_sub(1).map(|i| &self.entries[i].1)
    }

    /// All entries in chronological order.
    pub fn entries(&self) -> &[(Timestamp, V)] {
        &self.entries
    }

    /// Whether the series has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Target value series for one machine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MachineTargetValues {
    /// Target CCV series.
    pub target_ccv: TargetValueList<i16>,
    /// Target MDP series.
    pub target_mdp: TargetValueList<i16>,
    /// Target pass count series.
    pub target_pass_count: TargetValueList<u16>,
    /// Target lift thickness series, world elevation units.
    pub target_lift_thickness: TargetValueList<f32>,
    /// Target material temperature range series, tenths of a degree.
    pub temperature_range: TargetValueList<(u16, u16)>,
}

/// Per-machine target value series for the whole project.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TargetValueStore {
    by_machine: IndexMap<MachineId, MachineTargetValues>,
}

impl TargetValueStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The series for `machine`, creating an empty set on first use.
    pub fn for_machine_mut(&mut self, machine: MachineId) -> &mut MachineTargetValues {
        self.by_machine.entry(machine).or_default()
    }

    /// The series for `machine`, when any have been recorded.
    pub fn for_machine(&self, machine: MachineId) -> Option<&MachineTargetValues> {
        self.by_machine.get(&machine)
    }

    /// All machines with recorded targets, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (MachineId, &MachineTargetValues)> {
        self.by_machine.iter().map(|(id, v)| (*id, v))
    }

    /// Number of machines with recorded targets.
    pub fn len(&self) -> usize {
        self.by_machine.len()
    }

    /// Whether no targets are recorded at all.
    pub fn is_empty(&self) -> bool {
        self.by_machine.is_empty()
    }
}

/// One surface design registered with the project.
#[derive(Clone, Debug, PartialEq)]
pub struct DesignRecord {
    /// The design's id.
    pub id: DesignId,
    /// Display name.
    pub name: String,
    /// World-space extents of the design surface.
    pub extents: BoundingExtents3D,
}

/// The project's designs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DesignList {
    designs: IndexMap<DesignId, DesignRecord>,
}

impl DesignList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a design record.
    pub fn add(&mut self, record: DesignRecord) {
        self.designs.insert(record.id, record);
    }

    /// Look up a design by id.
    pub fn get(&self, id: DesignId) -> Option<&DesignRecord> {
        self.designs.get(&id)
    }

    /// All designs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DesignRecord> {
        self.designs.values()
    }

    /// Number of designs.
    pub fn len(&self) -> usize {
        self.designs.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.designs.is_empty()
    }
}

/// A surveyed surface: a design snapshot valid as of a survey date.
#[derive(Clone, Debug, PartialEq)]
pub struct SurveyedSurfaceRecord {
    /// The surveyed surface's id.
    pub id: SurveyedSurfaceId,
    /// Display name.
    pub name: String,
    /// The design holding the surveyed elevations.
    pub design: DesignId,
    /// Survey date; the surface describes the ground as of this instant.
    pub as_of: Timestamp,
    /// Vertical offset applied to the surveyed elevations.
    pub offset: f64,
}

/// The project's surveyed surfaces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurveyedSurfaceList {
    surfaces: IndexMap<SurveyedSurfaceId, SurveyedSurfaceRecord>,
}

impl SurveyedSurfaceList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a surveyed surface record.
    pub fn add(&mut self, record: SurveyedSurfaceRecord) {
        self.surfaces.insert(record.id, record);
    }

    /// Look up a surveyed surface by id.
    pub fn get(&self, id: SurveyedSurfaceId) -> Option<&SurveyedSurfaceRecord> {
        self.surfaces.get(&id)
    }

    /// All surveyed surfaces in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SurveyedSurfaceRecord> {
        self.surfaces.values()
    }

    /// Surfaces surveyed at or after `time`.
    pub fn newer_than(&self, time: Timestamp) -> impl Iterator<Item = &SurveyedSurfaceRecord> {
        self.surfaces.values().filter(move |s| s.as_of >= time)
    }

    /// Surfaces surveyed before `time`.
    pub fn older_than(&self, time: Timestamp) -> impl Iterator<Item = &SurveyedSurfaceRecord> {
        self.surfaces.values().filter(move |s| s.as_of < time)
    }

    /// Number of surveyed surfaces.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

/// One alignment (road centreline) registered with the project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignmentRecord {
    /// The alignment's id.
    pub id: AlignmentId,
    /// Display name.
    pub name: String,
}

/// The project's alignments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlignmentList {
    alignments: IndexMap<AlignmentId, AlignmentRecord>,
}

impl AlignmentList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an alignment record.
    pub fn add(&mut self, record: AlignmentRecord) {
        self.alignments.insert(record.id, record);
    }

    /// Look up an alignment by id.
    pub fn get(&self, id: AlignmentId) -> Option<&AlignmentRecord> {
        self.alignments.get(&id)
    }

    /// All alignments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AlignmentRecord> {
        self.alignments.values()
    }

    /// Number of alignments.
    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }
}

/// One proofing run: a named, time-bounded pass of a machine over an
/// area recorded for compaction sign-off.
#[derive(Clone, Debug, PartialEq)]
pub struct ProofingRunRecord {
    /// Display name.
    pub name: String,
    /// The machine that performed the run.
    pub machine: MachineId,
    /// When the run started.
    pub start_time: Timestamp,
    /// When the run ended.
    pub end_time: Timestamp,
    /// World-space extents covered by the run.
    pub extents: BoundingExtents3D,
}

/// The project's proofing runs, in recorded order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProofingRunList {
    runs: Vec<ProofingRunRecord>,
}

impl ProofingRunList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a proofing run.
    pub fn add(&mut self, record: ProofingRunRecord) {
        self.runs.push(record);
    }

    /// All runs in recorded order.
    pub fn iter(&self) -> impl Iterator<Item = &ProofingRunRecord> {
        self.runs.iter()
    }

    /// Number of runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
