use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::validators::{HasId, HasName};
use crate::db::{Entity, EntityStore};
use crate::mediator::{Handler, Request};
use crate::models::{Collection, CreateCollectionInput, UpdateCollectionInput};
use crate::projection::Projector;

#[derive(Debug, Clone)]
pub struct GetCollections;

impl Request for GetCollections {
    type Response = Vec<Collection>;
}

#[derive(Debug, Clone)]
pub struct GetCollectionById {
    pub id: String,
}

impl Request for GetCollectionById {
    type Response = Option<Collection>;
}

#[derive(Debug, Clone)]
pub struct CreateCollection {
    pub input: CreateCollectionInput,
}

impl Request for CreateCollection {
    type Response = Collection;
}

#[derive(Debug, Clone)]
pub struct UpdateCollection {
    pub id: String,
    pub input: UpdateCollectionInput,
}

impl Request for UpdateCollection {
    type Response = Option<Collection>;
}

#[derive(Debug, Clone)]
pub struct DeleteCollection {
    pub id: String,
}

impl Request for DeleteCollection {
    type Response = bool;
}

impl HasId for GetCollectionById {
    fn target_id(&self) -> &str {
        &self.id
    }
}

impl HasId for UpdateCollection {
    fn target_id(&self) -> &str {
        &self.id
    }
}

impl HasId for DeleteCollection {
    fn target_id(&self) -> &str {
        &self.id
    }
}

impl HasName for CreateCollection {
    fn name(&self) -> &str {
        &self.input.name
    }
}

impl HasName for UpdateCollection {
    fn name(&self) -> &str {
        &self.input.name
    }
}

pub struct CollectionHandler {
    store: Arc<dyn EntityStore<Collection>>,
    projector: Projector,
}

impl CollectionHandler {
    pub fn new(store: Arc<dyn EntityStore<Collection>>, projector: Projector) -> Self {
        Self { store, projector }
    }
}

#[async_trait]
impl Handler<GetCollections> for CollectionHandler {
    async fn handle(
        &self,
        _: GetCollections,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<Collection>> {
        Ok(self.store.get_all(cancel)?)
    }
}

#[async_trait]
impl Handler<GetCollectionById> for CollectionHandler {
    async fn handle(
        &self,
        request: GetCollectionById,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Option<Collection>> {
        Ok(self.store.get_by_id(&request.id, cancel)?)
    }
}

#[async_trait]
impl Handler<CreateCollection> for CollectionHandler {
    async fn handle(
        &self,
        request: CreateCollection,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Collection> {
        let projection = self.projector.begin().await;
        let collection = self.store.insert(Collection::new(request.input), cancel)?;
        tracing::info!(id = %collection.id, "Collection created");
        projection.collection(collection.clone());
        Ok(collection)
    }
}

#[async_trait]
impl Handler<UpdateCollection> for CollectionHandler {
    async fn handle(
        &self,
        request: UpdateCollection,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Option<Collection>> {
        let projection = self.projector.begin().await;
        let updated = self.store.update(&request.id, request.input, cancel)?;
        if let Some(collection) = &updated {
            projection.collection(collection.clone());
        }
        Ok(updated)
    }
}

#[async_trait]
impl Handler<DeleteCollection> for CollectionHandler {
    async fn handle(
        &self,
        request: DeleteCollection,
        cancel: &CancellationToken,
    ) -> anyhow::Result<bool> {
        let projection = self.projector.begin().await;
        let removed = self.store.delete(&request.id, cancel)?;
        if removed {
            projection.forget(Collection::KIND, request.id);
        }
        Ok(removed)
    }
}
