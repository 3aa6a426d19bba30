//! Commands, queries, and the startup registry that wires them to handlers
//! and validators.

mod captures;
mod collections;
mod type_inference;
pub mod validators;

pub use captures::*;
pub use collections::*;
pub use type_inference::*;

use std::sync::Arc;

use anyhow::Result;

use crate::config::{ServerConfig, StoreKind};
use crate::db::{EntityStore, MemoryStore, SqliteStore};
use crate::mediator::{DispatchError, Dispatcher};
use crate::models::{Capture, Collection};
use crate::projection::{Projector, RedisProjection};
use validators::{ConfidenceInRange, IdRequired, NameRequired, TextRequired};

/// The stores and projection the handlers operate on.
#[derive(Clone)]
pub struct Services {
    pub captures: Arc<dyn EntityStore<Capture>>,
    pub collections: Arc<dyn EntityStore<Collection>>,
    pub projector: Projector,
}

impl Services {
    /// Process-local stores with no projection.
    pub fn in_memory() -> Self {
        Self {
            captures: Arc::new(MemoryStore::<Capture>::new()),
            collections: Arc::new(MemoryStore::<Collection>::new()),
            projector: Projector::disabled(),
        }
    }

    pub fn with_projector(mut self, projector: Projector) -> Self {
        self.projector = projector;
        self
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let mut services = match config.store {
            StoreKind::Memory => Self::in_memory(),
            StoreKind::Sqlite => {
                let store = match &config.db_path {
                    Some(path) => SqliteStore::open(path.clone())?,
                    None => SqliteStore::open_default()?,
                };
                store.migrate()?;
                let store = Arc::new(store);
                Self {
                    captures: store.clone(),
                    collections: store,
                    projector: Projector::disabled(),
                }
            }
        };

        if let Some(redis) = &config.redis {
            tracing::info!("Projecting entities to {}", redis.url);
            services.projector =
                Projector::new(Arc::new(RedisProjection::new(&redis.url, &redis.token)));
        }

        Ok(services)
    }
}

/// Register every request type with its handler and validators.
pub fn build_dispatcher(services: &Services) -> Result<Dispatcher, DispatchError> {
    let captures = Arc::new(CaptureHandler::new(
        services.captures.clone(),
        services.projector.clone(),
    ));
    let collections = Arc::new(CollectionHandler::new(
        services.collections.clone(),
        services.projector.clone(),
    ));
    let inference = Arc::new(TypeInferenceHandler);

    let id_required = Arc::new(IdRequired);
    let text_required = Arc::new(TextRequired);
    let name_required = Arc::new(NameRequired);
    let confidence = Arc::new(ConfidenceInRange);

    Dispatcher::builder()
        // Captures
        .handler::<GetCaptures>(captures.clone())
        .handler::<GetCaptureById>(captures.clone())
        .handler::<CreateCapture>(captures.clone())
        .handler::<UpdateCapture>(captures.clone())
        .handler::<DeleteCapture>(captures)
        .validator::<GetCaptureById>(id_required.clone())
        .validator::<CreateCapture>(text_required.clone())
        .validator::<CreateCapture>(confidence.clone())
        .validator::<UpdateCapture>(id_required.clone())
        .validator::<UpdateCapture>(text_required.clone())
        .validator::<UpdateCapture>(confidence.clone())
        .validator::<DeleteCapture>(id_required.clone())
        // Collections
        .handler::<GetCollections>(collections.clone())
        .handler::<GetCollectionById>(collections.clone())
        .handler::<CreateCollection>(collections.clone())
        .handler::<UpdateCollection>(collections.clone())
        .handler::<DeleteCollection>(collections)
        .validator::<GetCollectionById>(id_required.clone())
        .validator::<CreateCollection>(name_required.clone())
        .validator::<UpdateCollection>(id_required.clone())
        .validator::<UpdateCollection>(name_required)
        .validator::<DeleteCollection>(id_required)
        // Type inference
        .handler::<InferType>(inference.clone())
        .handler::<ConfirmType>(inference)
        .validator::<InferType>(text_required)
        .validator::<ConfirmType>(Arc::new(ConfirmationComplete))
        .validator::<ConfirmType>(confidence)
        .require::<GetCaptures>()
        .require::<GetCaptureById>()
        .require::<CreateCapture>()
        .require::<UpdateCapture>()
        .require::<DeleteCapture>()
        .require::<GetCollections>()
        .require::<GetCollectionById>()
        .require::<CreateCollection>()
        .require::<UpdateCollection>()
        .require::<DeleteCollection>()
        .require::<InferType>()
        .require::<ConfirmType>()
        .build()
}
