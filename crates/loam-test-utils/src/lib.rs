//! Test utilities and mock types for Loam development.
//!
//! Provides mock implementations of the persistence seam
//! ([`MemoryStore`], [`FailingStore`]) and reusable site model fixtures
//! for pipeline testing.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use loam_core::ProjectId;
use loam_model::{PersistentStore, StoreError, StreamKind};

pub mod fixtures;

/// In-memory [`PersistentStore`] keyed by project and stream name.
///
/// Pre-populate streams with [`write_stream`](PersistentStore::write_stream)
/// before passing to code under test.
#[derive(Default)]
pub struct MemoryStore {
    streams: Mutex<HashMap<(ProjectId, String, StreamKind), Vec<u8>>>,
}

type StreamMap = HashMap<(ProjectId, String, StreamKind), Vec<u8>>;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of streams currently held, for test assertions.
    pub fn stream_count(&self) -> usize {
        self.lock().len()
    }

    /// Whether a stream exists for the given project.
    pub fn has_stream(&self, project: ProjectId, name: &str, kind: StreamKind) -> bool {
        self.lock().contains_key(&(project, name.to_owned(), kind))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StreamMap> {
        self.streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PersistentStore for MemoryStore {
    fn read_stream(
        &self,
        project: ProjectId,
        name: &str,
        kind: StreamKind,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().get(&(project, name.to_owned(), kind)).cloned())
    }

    fn write_stream(
        &self,
        project: ProjectId,
        name: &str,
        kind: StreamKind,
        data: &[u8],
    ) -> Result<(), StoreError> {
        self.lock()
            .insert((project, name.to_owned(), kind), data.to_vec());
        Ok(())
    }

    fn remove_stream(
        &self,
        project: ProjectId,
        name: &str,
        kind: StreamKind,
    ) -> Result<(), StoreError> {
        self.lock().remove(&(project, name.to_owned(), kind));
        Ok(())
    }
}

/// A store whose reads fail deterministically after N successes.
///
/// Useful for testing lazy-load retry and error propagation. Writes
/// always succeed into the wrapped [`MemoryStore`].
pub struct FailingStore {
    inner: MemoryStore,
    succeed_count: usize,
    read_count: AtomicUsize,
}

impl FailingStore {
    /// A store that serves `succeed_count` reads then fails.
    pub fn new(succeed_count: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            succeed_count,
            read_count: AtomicUsize::new(0),
        }
    }

    /// How many reads have been attempted.
    pub fn reads(&self) -> usize {
        self.read_count.load(Ordering::Relaxed)
    }
}

impl PersistentStore for FailingStore {
    fn read_stream(
        &self,
        project: ProjectId,
        name: &str,
        kind: StreamKind,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let n = self.read_count.fetch_add(1, Ordering::Relaxed);
        if n >= self.succeed_count {
            return Err(StoreError {
                detail: format!("deliberate failure after {} reads", self.succeed_count),
            });
        }
        self.inner.read_stream(project, name, kind)
    }

    fn write_stream(
        &self,
        project: ProjectId,
        name: &str,
        kind: StreamKind,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        self.inner.write_stream(project, name, kind, bytes)
    }

    fn remove_stream(
        &self,
        project: ProjectId,
        name: &str,
        kind: StreamKind,
    ) -> Result<(), StoreError> {
        self.inner.remove_stream(project, name, kind)
    }
}
