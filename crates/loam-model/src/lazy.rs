//! Write-once lazy loading for site model child collections.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe load-once cell.
///
/// First access runs the loader under a short write lock with a second
/// emptiness check, so concurrent first-accesses race safely to a single
/// winner; every later access is a read-lock clone of the shared handle.
/// A failed load leaves the cell empty and the error with the caller, so
/// the next access retries.
#[derive(Debug, Default)]
pub struct LazyLoad<T> {
    cell: RwLock<Option<Arc<T>>>,
}

impl<T> LazyLoad<T> {
    /// An empty, not-yet-loaded cell.
    pub fn new() -> Self {
        Self {
            cell: RwLock::new(None),
        }
    }

    /// A cell already holding `value`, as if loaded.
    pub fn preloaded(value: T) -> Self {
        Self {
            cell: RwLock::new(Some(Arc::new(value))),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Arc<T>>> {
        match self.cell.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<T>>> {
        match self.cell.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Whether the cell holds a loaded value.
    pub fn is_loaded(&self) -> bool {
        self.read().is_some()
    }

    /// The loaded value without triggering a load.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.read().clone()
    }

    /// The loaded value, running `loader` on first access.
    pub fn get_or_load<E>(
        &self,
        loader: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(value) = self.read().clone() {
            return Ok(value);
        }
        let mut guard = self.write();
        // Another loader may have won the race while we waited.
        if let Some(value) = guard.as_ref() {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(loader()?);
        *guard = Some(Arc::clone(&value));
        Ok(value)
    }
}
