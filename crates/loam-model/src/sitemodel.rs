//! The site model aggregate and its copy-on-notify lifecycle.
//!
//! A `SiteModel` is an immutable snapshot once published: concurrent
//! requests share one instance freely because nothing is mutated in
//! place after construction except internally synchronized load-once
//! cells. Ingest notifications never touch a published model; they build
//! a replacement that shares every unaffected child collection by
//! reference and reloads only what the notification flags as modified.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loam_core::{ProjectId, Timestamp};
use loam_grid::{CellPassLeaf, ExistenceMap, SubGridTree};

use crate::codec::{self, SiteModelMetadata};
use crate::error::ModelError;
use crate::events::{
    AlignmentList, DesignList, MachineList, ProofingRunList, SurveyedSurfaceList,
    TargetValueStore,
};
use crate::lazy::LazyLoad;
use crate::store::{stream_names, PersistentStore, StreamKind};

/// A change notification from the ingest pipeline.
///
/// Each flag names a child collection that must be reloaded in the
/// replacement model; unflagged collections are shared by reference.
#[derive(Default)]
pub struct SiteModelChange {
    /// The production data existence map changed.
    pub existence_map_modified: bool,
    /// Leaf regions of the production data tree that changed. Applying
    /// the change drops exactly these leaves from the replacement
    /// model's tree so they reload from storage on next access; the
    /// rest of the tree stays shared with the prior model.
    pub modified_regions: Option<ExistenceMap>,
    /// The machine list changed.
    pub machines_modified: bool,
    /// Machine target values changed.
    pub machine_targets_modified: bool,
    /// The design list changed.
    pub designs_modified: bool,
    /// The surveyed surface list changed.
    pub surveyed_surfaces_modified: bool,
    /// The alignment list changed.
    pub alignments_modified: bool,
    /// The proofing run list changed.
    pub proofing_runs_modified: bool,
    /// The model is to be removed from service.
    pub marked_for_deletion: bool,
}

impl SiteModelChange {
    /// A change touching only the existence map.
    pub fn existence_only() -> Self {
        Self {
            existence_map_modified: true,
            ..Self::default()
        }
    }
}

/// Aggregate root for one project's spatial data.
pub struct SiteModel {
    id: ProjectId,
    creation_time: Timestamp,
    last_modified: Timestamp,
    cell_size: f64,
    num_levels: u8,
    store: Option<Arc<dyn PersistentStore>>,
    marked_for_deletion: AtomicBool,

    grid: Arc<SubGridTree<CellPassLeaf>>,
    csib: Arc<LazyLoad<Vec<u8>>>,
    existence: Arc<LazyLoad<ExistenceMap>>,
    machines: Arc<LazyLoad<MachineList>>,
    targets: Arc<LazyLoad<TargetValueStore>>,
    designs: Arc<LazyLoad<DesignList>>,
    surveyed_surfaces: Arc<LazyLoad<SurveyedSurfaceList>>,
    alignments: Arc<LazyLoad<AlignmentList>>,
    proofing_runs: Arc<LazyLoad<ProofingRunList>>,
}

impl SiteModel {
    /// An in-memory model with no persistence, for ingest staging and
    /// tests. All collections start empty and loaded.
    pub fn transient(id: ProjectId, num_levels: u8, cell_size: f64) -> Self {
        let now = Timestamp::MIN;
        Self {
            id,
            creation_time: now,
            last_modified: now,
            cell_size,
            num_levels,
            store: None,
            marked_for_deletion: AtomicBool::new(false),
            grid: Arc::new(SubGridTree::new(num_levels, cell_size)),
            csib: Arc::new(LazyLoad::preloaded(Vec::new())),
            existence: Arc::new(LazyLoad::preloaded(ExistenceMap::new(
                num_levels, cell_size,
            ))),
            machines: Arc::new(LazyLoad::preloaded(MachineList::new())),
            targets: Arc::new(LazyLoad::preloaded(TargetValueStore::new())),
            designs: Arc::new(LazyLoad::preloaded(DesignList::new())),
            surveyed_surfaces: Arc::new(LazyLoad::preloaded(SurveyedSurfaceList::new())),
            alignments: Arc::new(LazyLoad::preloaded(AlignmentList::new())),
            proofing_runs: Arc::new(LazyLoad::preloaded(ProofingRunList::new())),
        }
    }

    /// Open a persisted model by reading its metadata stream. Child
    /// collections load lazily on first access.
    pub fn open(store: Arc<dyn PersistentStore>, id: ProjectId) -> Result<Self, ModelError> {
        let bytes = store
            .read_stream(id, stream_names::METADATA, StreamKind::SiteModelMetadata)?
            .ok_or(ModelError::ProjectNotFound { project: id })?;
        let meta = codec::decode_metadata(&mut bytes.as_slice())?;
        Ok(Self::from_metadata(store, meta))
    }

    fn from_metadata(store: Arc<dyn PersistentStore>, meta: SiteModelMetadata) -> Self {
        Self {
            id: meta.id,
            creation_time: meta.creation_time,
            last_modified: meta.last_modified,
            cell_size: meta.cell_size,
            num_levels: meta.num_levels,
            store: Some(store),
            marked_for_deletion: AtomicBool::new(false),
            grid: Arc::new(SubGridTree::new(meta.num_levels, meta.cell_size)),
            csib: Arc::new(LazyLoad::new()),
            existence: Arc::new(LazyLoad::new()),
            machines: Arc::new(LazyLoad::new()),
            targets: Arc::new(LazyLoad::new()),
            designs: Arc::new(LazyLoad::new()),
            surveyed_surfaces: Arc::new(LazyLoad::new()),
            alignments: Arc::new(LazyLoad::new()),
            proofing_runs: Arc::new(LazyLoad::new()),
        }
    }

    /// Create a fresh persisted model and write its metadata stream.
    pub fn create(
        store: Arc<dyn PersistentStore>,
        id: ProjectId,
        num_levels: u8,
        cell_size: f64,
        created_at: Timestamp,
    ) -> Result<Self, ModelError> {
        let meta = SiteModelMetadata {
            id,
            creation_time: created_at,
            last_modified: created_at,
            cell_size,
            num_levels,
        };
        let mut bytes = Vec::new();
        codec::encode_metadata(&mut bytes, &meta)?;
        store.write_stream(id, stream_names::METADATA, StreamKind::SiteModelMetadata, &bytes)?;
        Ok(Self::from_metadata(store, meta))
    }

    /// The project id.
    pub fn id(&self) -> ProjectId {
        self.id
    }

    /// When the model was created.
    pub fn creation_time(&self) -> Timestamp {
        self.creation_time
    }

    /// When the model last changed.
    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    /// World units per ground cell.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Depth of the production data tree.
    pub fn num_levels(&self) -> u8 {
        self.num_levels
    }

    /// Whether the model is in-memory only.
    pub fn is_transient(&self) -> bool {
        self.store.is_none()
    }

    /// Whether the model has been marked for removal. Lookups treat a
    /// marked model as absent; existing holders keep a valid snapshot.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion.load(Ordering::Acquire)
    }

    /// Mark the model for removal.
    pub fn mark_for_deletion(&self) {
        self.marked_for_deletion.store(true, Ordering::Release);
    }

    /// The production data tree.
    pub fn grid(&self) -> &SubGridTree<CellPassLeaf> {
        &self.grid
    }

    /// Mutable access to the production data tree, for ingest staging
    /// before the model is published. Exclusive access is guaranteed by
    /// the `&mut self` receiver; a shared tree is copied on write.
    pub fn grid_mut(&mut self) -> &mut SubGridTree<CellPassLeaf> {
        Arc::make_mut(&mut self.grid)
    }

    fn read_stream(&self, name: &str, kind: StreamKind) -> Result<Option<Vec<u8>>, ModelError> {
        match &self.store {
            Some(store) => Ok(store.read_stream(self.id, name, kind)?),
            None => Ok(None),
        }
    }

    /// The coordinate system blob, loaded once.
    pub fn csib(&self) -> Result<Arc<Vec<u8>>, ModelError> {
        self.csib.get_or_load(|| {
            Ok(self
                .read_stream(stream_names::COORDINATE_SYSTEM, StreamKind::CoordinateSystem)?
                .unwrap_or_default())
        })
    }

    /// The production data existence map, loaded once. A project with no
    /// persisted map answers with an empty one.
    pub fn existence_map(&self) -> Result<Arc<ExistenceMap>, ModelError> {
        self.existence.get_or_load(|| {
            match self.read_stream(stream_names::EXISTENCE_MAP, StreamKind::ExistenceMap)? {
                Some(bytes) => Ok(loam_grid::io::decode_existence_map(&mut bytes.as_slice())?),
                None => Ok(ExistenceMap::new(self.num_levels, self.cell_size)),
            }
        })
    }

    /// The machine list, loaded once.
    pub fn machines(&self) -> Result<Arc<MachineList>, ModelError> {
        self.machines.get_or_load(|| {
            match self.read_stream(stream_names::MACHINES, StreamKind::Machines)? {
                Some(bytes) => codec::decode_machines(&mut bytes.as_slice()),
                None => Ok(MachineList::new()),
            }
        })
    }

    /// Per-machine target value series, loaded once.
    pub fn targets(&self) -> Result<Arc<TargetValueStore>, ModelError> {
        self.targets.get_or_load(|| {
            match self.read_stream(stream_names::MACHINE_TARGETS, StreamKind::MachineTargets)? {
                Some(bytes) => codec::decode_targets(&mut bytes.as_slice()),
                None => Ok(TargetValueStore::new()),
            }
        })
    }

    /// The design list, loaded once.
    pub fn designs(&self) -> Result<Arc<DesignList>, ModelError> {
        self.designs.get_or_load(|| {
            match self.read_stream(stream_names::DESIGNS, StreamKind::Designs)? {
                Some(bytes) => codec::decode_designs(&mut bytes.as_slice()),
                None => Ok(DesignList::new()),
            }
        })
    }

    /// The surveyed surface list, loaded once.
    pub fn surveyed_surfaces(&self) -> Result<Arc<SurveyedSurfaceList>, ModelError> {
        self.surveyed_surfaces.get_or_load(|| {
            match self
                .read_stream(stream_names::SURVEYED_SURFACES, StreamKind::SurveyedSurfaces)?
            {
                Some(bytes) => codec::decode_surveyed_surfaces(&mut bytes.as_slice()),
                None => Ok(SurveyedSurfaceList::new()),
            }
        })
    }

    /// The alignment list, loaded once.
    pub fn alignments(&self) -> Result<Arc<AlignmentList>, ModelError> {
        self.alignments.get_or_load(|| {
            match self.read_stream(stream_names::ALIGNMENTS, StreamKind::Alignments)? {
                Some(bytes) => codec::decode_alignments(&mut bytes.as_slice()),
                None => Ok(AlignmentList::new()),
            }
        })
    }

    /// The proofing run list, loaded once.
    pub fn proofing_runs(&self) -> Result<Arc<ProofingRunList>, ModelError> {
        self.proofing_runs.get_or_load(|| {
            match self.read_stream(stream_names::PROOFING_RUNS, StreamKind::ProofingRuns)? {
                Some(bytes) => codec::decode_proofing_runs(&mut bytes.as_slice()),
                None => Ok(ProofingRunList::new()),
            }
        })
    }

    /// Whether `self` and `other` share the production data tree.
    pub fn shares_grid_with(&self, other: &SiteModel) -> bool {
        Arc::ptr_eq(&self.grid, &other.grid)
    }

    /// Whether `self` and `other` share the machine list cell.
    pub fn shares_machines_with(&self, other: &SiteModel) -> bool {
        Arc::ptr_eq(&self.machines, &other.machines)
    }

    /// Whether `self` and `other` share the design list cell.
    pub fn shares_designs_with(&self, other: &SiteModel) -> bool {
        Arc::ptr_eq(&self.designs, &other.designs)
    }

    /// Whether `self` and `other` share the existence map cell.
    pub fn shares_existence_map_with(&self, other: &SiteModel) -> bool {
        Arc::ptr_eq(&self.existence, &other.existence)
    }

    /// Build the replacement model for a change notification.
    ///
    /// The prior model is left untouched and remains fully valid for any
    /// request still holding it. Collections the change does not flag
    /// are shared by reference; flagged collections get fresh unloaded
    /// cells so they reload from storage on next access. A region
    /// bitmask drops exactly the matching leaves from the replacement's
    /// tree, structurally sharing everything else.
    pub fn apply_changes(&self, change: &SiteModelChange, modified_at: Timestamp) -> SiteModel {
        let mut next = SiteModel {
            id: self.id,
            creation_time: self.creation_time,
            last_modified: modified_at,
            cell_size: self.cell_size,
            num_levels: self.num_levels,
            store: self.store.clone(),
            marked_for_deletion: AtomicBool::new(
                self.is_marked_for_deletion() || change.marked_for_deletion,
            ),
            grid: Arc::clone(&self.grid),
            csib: Arc::clone(&self.csib),
            existence: Arc::clone(&self.existence),
            machines: Arc::clone(&self.machines),
            targets: Arc::clone(&self.targets),
            designs: Arc::clone(&self.designs),
            surveyed_surfaces: Arc::clone(&self.surveyed_surfaces),
            alignments: Arc::clone(&self.alignments),
            proofing_runs: Arc::clone(&self.proofing_runs),
        };

        if change.existence_map_modified {
            next.existence = Arc::new(self.fresh_existence_cell());
        }
        if let Some(regions) = &change.modified_regions {
            // Structural copy: the clone shares every sub grid with the
            // prior tree; removal copies only the touched paths.
            let mut grid = (*self.grid).clone();
            regions.scan_set_bits_as_addresses(|addr| {
                grid.remove_leaf(addr.x, addr.y);
            });
            next.grid = Arc::new(grid);
        }
        if change.machines_modified {
            next.machines = Arc::new(self.fresh_cell(MachineList::new));
        }
        if change.machine_targets_modified {
            next.targets = Arc::new(self.fresh_cell(TargetValueStore::new));
        }
        if change.designs_modified {
            next.designs = Arc::new(self.fresh_cell(DesignList::new));
        }
        if change.surveyed_surfaces_modified {
            next.surveyed_surfaces = Arc::new(self.fresh_cell(SurveyedSurfaceList::new));
        }
        if change.alignments_modified {
            next.alignments = Arc::new(self.fresh_cell(AlignmentList::new));
        }
        if change.proofing_runs_modified {
            next.proofing_runs = Arc::new(self.fresh_cell(ProofingRunList::new));
        }

        next
    }

    // Transient models have no storage to reload from; their "reloaded"
    // collection is a fresh empty one, already loaded.
    fn fresh_cell<T>(&self, empty: impl FnOnce() -> T) -> LazyLoad<T> {
        if self.store.is_some() {
            LazyLoad::new()
        } else {
            LazyLoad::preloaded(empty())
        }
    }

    fn fresh_existence_cell(&self) -> LazyLoad<ExistenceMap> {
        if self.store.is_some() {
            LazyLoad::new()
        } else {
            LazyLoad::preloaded(ExistenceMap::new(self.num_levels, self.cell_size))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::{CellPass, MachineId};

    fn populated_transient() -> SiteModel {
        let mut model = SiteModel::transient(ProjectId(1), 6, 0.34);
        let leaf = model.grid_mut().construct_leaf(1000, 2000);
        leaf.add_pass(
            0,
            0,
            CellPass::at(Timestamp::from_seconds(10), 5.0, MachineId(1)),
        );
        model
    }

    #[test]
    fn existence_only_change_shares_everything_else() {
        let prior = populated_transient();
        let next = prior.apply_changes(
            &SiteModelChange::existence_only(),
            Timestamp::from_seconds(99),
        );

        assert!(next.shares_machines_with(&prior));
        assert!(next.shares_designs_with(&prior));
        assert!(next.shares_grid_with(&prior));
        assert!(!next.shares_existence_map_with(&prior));
        assert_eq!(next.last_modified(), Timestamp::from_seconds(99));
    }

    #[test]
    fn region_bitmask_drops_only_matching_leaves() {
        let mut prior = populated_transient();
        prior.grid_mut().construct_leaf(5000, 5000);
        assert_eq!(prior.grid().leaf_count(), 2);

        let mut regions = ExistenceMap::new(6, 0.34);
        regions.set_for_data_address(loam_grid::CellAddress { x: 5000, y: 5000 });

        let change = SiteModelChange {
            existence_map_modified: true,
            modified_regions: Some(regions),
            ..SiteModelChange::default()
        };
        let next = prior.apply_changes(&change, Timestamp::from_seconds(1));

        // Prior model is untouched.
        assert_eq!(prior.grid().leaf_count(), 2);
        assert!(prior.grid().locate_leaf(5000, 5000).is_some());

        // Replacement lost exactly the notified leaf and still shares
        // the untouched one.
        assert!(next.grid().locate_leaf(5000, 5000).is_none());
        assert!(next.grid().locate_leaf(1000, 2000).is_some());
        assert!(next.grid().shares_leaf_with(prior.grid(), 1000, 2000));
    }

    #[test]
    fn deletion_mark_survives_apply_changes() {
        let prior = populated_transient();
        prior.mark_for_deletion();
        let next = prior.apply_changes(
            &SiteModelChange::default(),
            Timestamp::from_seconds(1),
        );
        assert!(next.is_marked_for_deletion());
    }

    #[test]
    fn transient_collections_start_loaded_and_empty() {
        let model = SiteModel::transient(ProjectId(2), 5, 1.0);
        assert!(model.is_transient());
        assert!(model.machines().unwrap().is_empty());
        assert!(model.existence_map().unwrap().is_empty());
        assert!(model.proofing_runs().unwrap().is_empty());
    }
}
