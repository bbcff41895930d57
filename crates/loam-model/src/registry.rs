//! Process-wide site model cache and its notification pump.
//!
//! The registry is the only shared mutable state between concurrent
//! query workers. Reads take a short read lock and clone an `Arc`;
//! writers build the replacement model entirely outside the lock and
//! swap the reference under a short write section. In-flight readers
//! holding the old `Arc` keep a fully consistent, if slightly stale,
//! view and are never blocked.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use indexmap::IndexMap;
use loam_core::{ProjectId, Timestamp};
use tracing::{debug, info, warn};

use crate::sitemodel::{SiteModel, SiteModelChange};

type ModelMap = IndexMap<ProjectId, Arc<SiteModel>>;

/// In-memory cache of published site models, keyed by project.
#[derive(Default)]
pub struct SiteModelRegistry {
    models: RwLock<ModelMap>,
}

impl SiteModelRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, ModelMap> {
        match self.models.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ModelMap> {
        match self.models.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Publish a model, replacing any prior instance for the project.
    pub fn publish(&self, model: Arc<SiteModel>) {
        let id = model.id();
        self.write().insert(id, model);
        debug!(project = %id, "site model published");
    }

    /// Look up a project's current model.
    ///
    /// A model marked for deletion is treated as absent: it is evicted
    /// here and `None` is returned, without disturbing callers that
    /// already hold a reference to it.
    pub fn get(&self, id: ProjectId) -> Option<Arc<SiteModel>> {
        let found = self.read().get(&id).cloned();
        let model = found?;
        if model.is_marked_for_deletion() {
            let mut guard = self.write();
            // Only evict the instance we saw; a replacement published in
            // the meantime stays.
            if guard
                .get(&id)
                .is_some_and(|current| Arc::ptr_eq(current, &model))
            {
                guard.swap_remove(&id);
                info!(project = %id, "evicted site model marked for deletion");
            }
            return None;
        }
        Some(model)
    }

    /// Apply a change notification to a project's model.
    ///
    /// The replacement is constructed outside the lock from the current
    /// instance, then swapped in under a short write section. Returns
    /// the replacement, or `None` when the project is unknown or the
    /// change marked it for deletion.
    pub fn apply_change(
        &self,
        id: ProjectId,
        change: &SiteModelChange,
        modified_at: Timestamp,
    ) -> Option<Arc<SiteModel>> {
        let current = self.read().get(&id).cloned()?;

        if change.marked_for_deletion {
            current.mark_for_deletion();
            let mut guard = self.write();
            if guard
                .get(&id)
                .is_some_and(|c| Arc::ptr_eq(c, &current))
            {
                guard.swap_remove(&id);
            }
            info!(project = %id, "site model removed by deletion notification");
            return None;
        }

        let replacement = Arc::new(current.apply_changes(change, modified_at));
        {
            let mut guard = self.write();
            guard.insert(id, Arc::clone(&replacement));
        }
        debug!(project = %id, "site model replaced by change notification");
        Some(replacement)
    }

    /// Number of cached models.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry holds no models.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Ids of all cached models, in insertion order.
    pub fn project_ids(&self) -> Vec<ProjectId> {
        self.read().keys().copied().collect()
    }
}

/// One queued change notification.
pub struct ChangeNotification {
    /// The project whose model changed.
    pub project: ProjectId,
    /// When the change took effect.
    pub modified_at: Timestamp,
    /// What changed.
    pub change: SiteModelChange,
}

/// Applies queued change notifications to a registry.
///
/// Ingest publishes notifications into the channel; the pump drains
/// them on its own worker (or on demand in tests) so registry swaps
/// never run on an ingest thread.
pub struct NotificationPump {
    registry: Arc<SiteModelRegistry>,
    receiver: Receiver<ChangeNotification>,
}

impl NotificationPump {
    /// Create a pump and the sender half used by ingest.
    pub fn new(registry: Arc<SiteModelRegistry>) -> (Sender<ChangeNotification>, Self) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (
            sender,
            Self {
                registry,
                receiver,
            },
        )
    }

    /// Apply one notification.
    fn apply(&self, notification: ChangeNotification) {
        let applied = self.registry.apply_change(
            notification.project,
            &notification.change,
            notification.modified_at,
        );
        if applied.is_none() && !notification.change.marked_for_deletion {
            warn!(
                project = %notification.project,
                "change notification for unknown project dropped"
            );
        }
    }

    /// Apply notifications until every sender is dropped.
    pub fn run(&self) {
        while let Ok(notification) = self.receiver.recv() {
            self.apply(notification);
        }
    }

    /// Apply every notification currently queued, without blocking.
    /// Returns how many were applied.
    pub fn drain_pending(&self) -> usize {
        let mut applied = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(notification) => {
                    self.apply(notification);
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return applied,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: u128) -> Arc<SiteModel> {
        Arc::new(SiteModel::transient(ProjectId(id), 6, 0.34))
    }

    #[test]
    fn publish_then_get_returns_same_instance() {
        let registry = SiteModelRegistry::new();
        let m = model(1);
        registry.publish(Arc::clone(&m));
        let got = registry.get(ProjectId(1)).unwrap();
        assert!(Arc::ptr_eq(&got, &m));
    }

    #[test]
    fn marked_model_is_absent_and_evicted() {
        let registry = SiteModelRegistry::new();
        let m = model(1);
        registry.publish(Arc::clone(&m));
        m.mark_for_deletion();

        assert!(registry.get(ProjectId(1)).is_none());
        assert!(registry.is_empty());
        // The holder's reference is still a valid snapshot.
        assert_eq!(m.id(), ProjectId(1));
    }

    #[test]
    fn apply_change_swaps_reference_and_keeps_old_valid() {
        let registry = SiteModelRegistry::new();
        let old = model(1);
        registry.publish(Arc::clone(&old));

        let new = registry
            .apply_change(
                ProjectId(1),
                &SiteModelChange::existence_only(),
                Timestamp::from_seconds(5),
            )
            .unwrap();

        assert!(!Arc::ptr_eq(&new, &old));
        let current = registry.get(ProjectId(1)).unwrap();
        assert!(Arc::ptr_eq(&current, &new));
        assert!(new.shares_grid_with(&old));
    }

    #[test]
    fn deletion_notification_removes_model() {
        let registry = SiteModelRegistry::new();
        registry.publish(model(1));
        let change = SiteModelChange {
            marked_for_deletion: true,
            ..SiteModelChange::default()
        };
        assert!(registry
            .apply_change(ProjectId(1), &change, Timestamp::from_seconds(1))
            .is_none());
        assert!(registry.get(ProjectId(1)).is_none());
    }

    #[test]
    fn unknown_project_change_is_dropped() {
        let registry = SiteModelRegistry::new();
        assert!(registry
            .apply_change(
                ProjectId(9),
                &SiteModelChange::existence_only(),
                Timestamp::from_seconds(1)
            )
            .is_none());
    }

    #[test]
    fn pump_drains_queued_notifications() {
        let registry = Arc::new(SiteModelRegistry::new());
        registry.publish(model(1));
        let before = registry.get(ProjectId(1)).unwrap();

        let (sender, pump) = NotificationPump::new(Arc::clone(&registry));
        sender
            .send(ChangeNotification {
                project: ProjectId(1),
                modified_at: Timestamp::from_seconds(10),
                change: SiteModelChange::existence_only(),
            })
            .unwrap();

        assert_eq!(pump.drain_pending(), 1);
        let after = registry.get(ProjectId(1)).unwrap();
        assert!(!Arc::ptr_eq(&after, &before));
        assert_eq!(after.last_modified(), Timestamp::from_seconds(10));
    }
}
