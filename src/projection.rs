//! Best-effort copies of entities in a remote key-value store.
//!
//! The projection is never read back and never authoritative. Writes happen
//! after the primary store has committed, on a background task that applies
//! them in commit order. Every failure is logged and dropped. No retries.
//!
//! The remote store is any Redis deployment that speaks the Upstash-style
//! REST protocol: a command is POSTed to the base URL as a JSON array of
//! strings, authenticated with a bearer token.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};

use crate::db::Entity;
use crate::models::{Capture, Collection};

/// Errors talking to the remote store. These never leave this module.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode entity: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Unauthorized: token missing or invalid")]
    Unauthorized,

    #[error("remote store rejected command: {0}")]
    Rejected(String),
}

/// Writes derived copies of entities. Implementations must swallow their own
/// failures.
#[async_trait]
pub trait ProjectionWriter: Send + Sync {
    async fn sync_capture(&self, capture: &Capture);
    async fn sync_collection(&self, collection: &Collection);
    /// Drop the projected copy of a deleted entity.
    async fn forget(&self, kind: &'static str, id: &str);
}

/// Used when no remote store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProjection;

#[async_trait]
impl ProjectionWriter for NoopProjection {
    async fn sync_capture(&self, _capture: &Capture) {}
    async fn sync_collection(&self, _collection: &Collection) {}
    async fn forget(&self, _kind: &'static str, _id: &str) {}
}

#[derive(Debug, Deserialize)]
struct CommandReply {
    error: Option<String>,
}

/// Projection into Redis over its REST interface.
#[derive(Debug, Clone)]
pub struct RedisProjection {
    base_url: String,
    token: String,
    client: Client,
}

impl RedisProjection {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: Client::new(),
        }
    }

    async fn command(&self, args: &[&str]) -> Result<(), ProjectionError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ProjectionError::Unauthorized);
        }

        let body = response.text().await?;
        let reply: Option<CommandReply> = serde_json::from_str(&body).ok();
        match reply.and_then(|r| r.error) {
            Some(error) => Err(ProjectionError::Rejected(error)),
            None if status.is_success() => Ok(()),
            None => Err(ProjectionError::Rejected(format!("{}: {}", status, body))),
        }
    }

    async fn set<T: Entity + serde::Serialize>(&self, entity: &T) -> Result<(), ProjectionError> {
        let value = serde_json::to_string(entity)?;
        self.command(&["SET", &projection_key(T::KIND, entity.id()), &value])
            .await
    }
}

#[async_trait]
impl ProjectionWriter for RedisProjection {
    async fn sync_capture(&self, capture: &Capture) {
        if let Err(e) = self.set(capture).await {
            tracing::warn!(id = %capture.id, "Failed to project capture: {}", e);
        }
    }

    async fn sync_collection(&self, collection: &Collection) {
        if let Err(e) = self.set(collection).await {
            tracing::warn!(id = %collection.id, "Failed to project collection: {}", e);
        }
    }

    async fn forget(&self, kind: &'static str, id: &str) {
        if let Err(e) = self.command(&["DEL", &projection_key(kind, id)]).await {
            tracing::warn!(id, kind, "Failed to remove projected entity: {}", e);
        }
    }
}

pub fn projection_key(kind: &str, id: &str) -> String {
    format!("{kind}:{id}")
}

enum Write {
    Capture(Capture),
    Collection(Collection),
    Forget(&'static str, String),
    Flush(oneshot::Sender<()>),
}

/// Schedules projection writes off the request path.
///
/// Writes are drained by one background task in the order they were queued,
/// so a `DEL` can never overtake the `SET` it follows. Queue through
/// [`Projector::begin`] so the queue order matches commit order.
#[derive(Clone)]
pub struct Projector {
    queue: Option<mpsc::UnboundedSender<Write>>,
    order: Arc<Mutex<()>>,
}

impl Projector {
    /// Starts the drain task, so this must be called inside a Tokio runtime.
    pub fn new(writer: Arc<dyn ProjectionWriter>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(write) = rx.recv().await {
                match write {
                    Write::Capture(capture) => writer.sync_capture(&capture).await,
                    Write::Collection(collection) => writer.sync_collection(&collection).await,
                    Write::Forget(kind, id) => writer.forget(kind, &id).await,
                    Write::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!("Projection queue closed");
        });

        Self {
            queue: Some(tx),
            order: Arc::new(Mutex::new(())),
        }
    }

    pub fn disabled() -> Self {
        Self {
            queue: None,
            order: Arc::new(Mutex::new(())),
        }
    }

    /// Hold the returned guard across the primary write and the writes it
    /// queues. Concurrent writers are serialized behind it.
    pub async fn begin(&self) -> Sequenced<'_> {
        Sequenced {
            _order: self.order.lock().await,
            queue: self.queue.as_ref(),
        }
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let Some(queue) = &self.queue else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if queue.send(Write::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

/// Exclusive access to the projection queue.
pub struct Sequenced<'a> {
    _order: MutexGuard<'a, ()>,
    queue: Option<&'a mpsc::UnboundedSender<Write>>,
}

impl Sequenced<'_> {
    pub fn capture(&self, capture: Capture) {
        self.push(Write::Capture(capture));
    }

    pub fn collection(&self, collection: Collection) {
        self.push(Write::Collection(collection));
    }

    pub fn forget(&self, kind: &'static str, id: String) {
        self.push(Write::Forget(kind, id));
    }

    fn push(&self, write: Write) {
        if let Some(queue) = self.queue {
            if queue.send(write).is_err() {
                tracing::warn!("Projection queue closed; write dropped");
            }
        }
    }
}
