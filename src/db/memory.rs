use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use super::{ensure_active, Entity, EntityStore, StoreError, StoreResult};

/// Process-local store. Entities are kept in insertion order.
#[derive(Debug)]
pub struct MemoryStore<T> {
    entities: Mutex<Vec<T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Vec<T>>> {
        self.entities.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntityStore<T> for MemoryStore<T> {
    fn get_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<T>> {
        ensure_active(cancel)?;
        Ok(self.lock()?.clone())
    }

    fn get_by_id(&self, id: &str, cancel: &CancellationToken) -> StoreResult<Option<T>> {
        ensure_active(cancel)?;
        Ok(self.lock()?.iter().find(|e| e.id() == id).cloned())
    }

    fn insert(&self, entity: T, cancel: &CancellationToken) -> StoreResult<T> {
        ensure_active(cancel)?;
        let mut entities = self.lock()?;
        if entities.iter().any(|e| e.id() == entity.id()) {
            return Err(StoreError::DuplicateId {
                kind: T::KIND,
                id: entity.id().to_string(),
            });
        }
        entities.push(entity.clone());
        Ok(entity)
    }

    fn update(
        &self,
        id: &str,
        changes: T::Changes,
        cancel: &CancellationToken,
    ) -> StoreResult<Option<T>> {
        ensure_active(cancel)?;
        let mut entities = self.lock()?;
        let Some(entity) = entities.iter_mut().find(|e| e.id() == id) else {
            return Ok(None);
        };
        entity.apply(changes);
        Ok(Some(entity.clone()))
    }

    fn delete(&self, id: &str, cancel: &CancellationToken) -> StoreResult<bool> {
        ensure_active(cancel)?;
        let mut entities = self.lock()?;
        let before = entities.len();
        entities.retain(|e| e.id() != id);
        Ok(entities.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capture, CreateCaptureInput};

    #[test]
    fn cancelled_token_blocks_every_operation() {
        let store = MemoryStore::<Capture>::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(store.get_all(&cancel), Err(StoreError::Cancelled)));
        assert!(matches!(
            store.insert(Capture::new(CreateCaptureInput::default()), &cancel),
            Err(StoreError::Cancelled)
        ));
        assert!(matches!(store.delete("x", &cancel), Err(StoreError::Cancelled)));
    }

    #[test]
    fn get_all_returns_a_snapshot() {
        let store = MemoryStore::<Capture>::new();
        let cancel = CancellationToken::new();
        let snapshot = store.get_all(&cancel).unwrap();

        store
            .insert(
                Capture::new(CreateCaptureInput {
                    text: "later".to_string(),
                    ..Default::default()
                }),
                &cancel,
            )
            .unwrap();

        assert!(snapshot.is_empty());
        assert_eq!(store.get_all(&cancel).unwrap().len(), 1);
    }
}
