//! Entity storage.
//!
//! [`EntityStore`] is the contract every backend honours: each operation is
//! atomic with respect to every other operation on the same store, and a
//! reader never observes a half-applied write. Two backends ship:
//!
//! - [`MemoryStore`]: process-local, insertion ordered, one lock per store.
//! - [`SqliteStore`]: durable, one connection behind one lock shared by the
//!   capture and collection tables.
//!
//! Every call takes the request's [`CancellationToken`] and refuses to start
//! once it has been triggered.

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A record that can live in an [`EntityStore`].
pub trait Entity: Clone + Send + Sync + 'static {
    /// The mutable fields accepted by [`EntityStore::update`].
    type Changes: Send;

    /// Short lowercase name used in logs, errors, and projection keys.
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Apply an update in place. Must never touch `id` or `created_at`.
    fn apply(&mut self, changes: Self::Changes);
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("{kind} with id {id} already exists")]
    DuplicateId { kind: &'static str, id: String },

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode stored value: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed storage for one entity type.
pub trait EntityStore<T: Entity>: Send + Sync {
    /// Snapshot of every entity in insertion order.
    fn get_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<T>>;

    fn get_by_id(&self, id: &str, cancel: &CancellationToken) -> StoreResult<Option<T>>;

    /// Fails with [`StoreError::DuplicateId`] if the id is already present.
    fn insert(&self, entity: T, cancel: &CancellationToken) -> StoreResult<T>;

    /// Returns `None` when no entity has this id.
    fn update(
        &self,
        id: &str,
        changes: T::Changes,
        cancel: &CancellationToken,
    ) -> StoreResult<Option<T>>;

    /// Returns whether an entity was removed.
    fn delete(&self, id: &str, cancel: &CancellationToken) -> StoreResult<bool>;
}

fn ensure_active(cancel: &CancellationToken) -> StoreResult<()> {
    if cancel.is_cancelled() {
        Err(StoreError::Cancelled)
    } else {
        Ok(())
    }
}
