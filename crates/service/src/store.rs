use std::collections::HashMap;
use std::sync::RwLock;

use kardex_core::{DomainError, DomainResult, DocumentId};

/// In-memory document store, one per workflow family.
///
/// `update` holds the write lock for the whole read-modify-write of a
/// transition, so two concurrent transitions on the same document cannot
/// interleave. Intended for tests/dev; a persistent backend would sit behind
/// the same surface.
#[derive(Debug, Default)]
pub struct DocumentStore<T> {
    inner: RwLock<HashMap<DocumentId, T>>,
}

impl<T: Clone> DocumentStore<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, id: DocumentId, document: T) -> DomainResult<()> {
        let mut map = self.write()?;
        if map.contains_key(&id) {
            return Err(DomainError::conflict(format!("document {id} already exists")));
        }
        map.insert(id, document);
        Ok(())
    }

    pub fn get(&self, id: DocumentId) -> DomainResult<T> {
        self.read()?.get(&id).cloned().ok_or(DomainError::NotFound)
    }

    /// Remove a document after `check` passes, under one write lock.
    pub fn remove(
        &self,
        id: DocumentId,
        check: impl FnOnce(&T) -> DomainResult<()>,
    ) -> DomainResult<T> {
        let mut map = self.write()?;
        let stored = map.get(&id).ok_or(DomainError::NotFound)?;
        check(stored)?;
        map.remove(&id).ok_or(DomainError::NotFound)
    }

    pub fn list(&self) -> DomainResult<Vec<T>> {
        Ok(self.read()?.values().cloned().collect())
    }

    pub fn list_where(&self, predicate: impl Fn(&T) -> bool) -> DomainResult<Vec<T>> {
        Ok(self
            .read()?
            .values()
            .filter(|d| predicate(d))
            .cloned()
            .collect())
    }

    /// Run a fallible mutation under the write lock. An `Err` from the
    /// closure leaves the stored document untouched.
    pub fn update<R>(
        &self,
        id: DocumentId,
        mutate: impl FnOnce(&mut T) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let mut map = self.write()?;
        let stored = map.get(&id).cloned().ok_or(DomainError::NotFound)?;
        let mut working = stored;
        let result = mutate(&mut working)?;
        map.insert(id, working);
        Ok(result)
    }

    fn read(&self) -> DomainResult<std::sync::RwLockReadGuard<'_, HashMap<DocumentId, T>>> {
        self.inner
            .read()
            .map_err(|_| DomainError::conflict("document store lock poisoned"))
    }

    fn write(&self) -> DomainResult<std::sync::RwLockWriteGuard<'_, HashMap<DocumentId, T>>> {
        self.inner
            .write()
            .map_err(|_| DomainError::conflict("document store lock poisoned"))
    }
}
