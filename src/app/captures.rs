use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::validators::{HasConfidence, HasId, HasText};
use crate::db::{Entity, EntityStore};
use crate::mediator::{Handler, Request};
use crate::models::{Capture, CreateCaptureInput, UpdateCaptureInput};
use crate::projection::Projector;

// ============================================================
// Requests
// ============================================================

#[derive(Debug, Clone)]
pub struct GetCaptures;

impl Request for GetCaptures {
    type Response = Vec<Capture>;
}

#[derive(Debug, Clone)]
pub struct GetCaptureById {
    pub id: String,
}

impl Request for GetCaptureById {
    type Response = Option<Capture>;
}

#[derive(Debug, Clone)]
pub struct CreateCapture {
    pub input: CreateCaptureInput,
}

impl Request for CreateCapture {
    type Response = Capture;
}

#[derive(Debug, Clone)]
pub struct UpdateCapture {
    pub id: String,
    pub input: UpdateCaptureInput,
}

impl Request for UpdateCapture {
    type Response = Option<Capture>;
}

#[derive(Debug, Clone)]
pub struct DeleteCapture {
    pub id: String,
}

impl Request for DeleteCapture {
    type Response = bool;
}

impl HasId for GetCaptureById {
    fn target_id(&self) -> &str {
        &self.id
    }
}

impl HasId for UpdateCapture {
    fn target_id(&self) -> &str {
        &self.id
    }
}

impl HasId for DeleteCapture {
    fn target_id(&self) -> &str {
        &self.id
    }
}

impl HasText for CreateCapture {
    fn text(&self) -> &str {
        &self.input.text
    }
}

impl HasText for UpdateCapture {
    fn text(&self) -> &str {
        &self.input.text
    }
}

impl HasConfidence for CreateCapture {
    fn confidence(&self) -> (&'static str, Option<f64>) {
        ("TypeConfidence", self.input.type_confidence)
    }
}

impl HasConfidence for UpdateCapture {
    fn confidence(&self) -> (&'static str, Option<f64>) {
        ("TypeConfidence", self.input.type_confidence)
    }
}

// ============================================================
// Handler
// ============================================================

/// Handles every capture request against one store.
pub struct CaptureHandler {
    store: Arc<dyn EntityStore<Capture>>,
    projector: Projector,
}

impl CaptureHandler {
    pub fn new(store: Arc<dyn EntityStore<Capture>>, projector: Projector) -> Self {
        Self { store, projector }
    }
}

#[async_trait]
impl Handler<GetCaptures> for CaptureHandler {
    async fn handle(&self, _: GetCaptures, cancel: &CancellationToken) -> anyhow::Result<Vec<Capture>> {
        Ok(self.store.get_all(cancel)?)
    }
}

#[async_trait]
impl Handler<GetCaptureById> for CaptureHandler {
    async fn handle(
        &self,
        request: GetCaptureById,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Option<Capture>> {
        Ok(self.store.get_by_id(&request.id, cancel)?)
    }
}

#[async_trait]
impl Handler<CreateCapture> for CaptureHandler {
    async fn handle(
        &self,
        request: CreateCapture,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Capture> {
        let projection = self.projector.begin().await;
        let capture = self.store.insert(Capture::new(request.input), cancel)?;
        tracing::info!(id = %capture.id, "Capture created");
        projection.capture(capture.clone());
        Ok(capture)
    }
}

#[async_trait]
impl Handler<UpdateCapture> for CaptureHandler {
    async fn handle(
        &self,
        request: UpdateCapture,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Option<Capture>> {
        let projection = self.projector.begin().await;
        let updated = self.store.update(&request.id, request.input, cancel)?;
        if let Some(capture) = &updated {
            projection.capture(capture.clone());
        }
        Ok(updated)
    }
}

#[async_trait]
impl Handler<DeleteCapture> for CaptureHandler {
    async fn handle(&self, request: DeleteCapture, cancel: &CancellationToken) -> anyhow::Result<bool> {
        let projection = self.projector.begin().await;
        let removed = self.store.delete(&request.id, cancel)?;
        if removed {
            tracing::info!(id = %request.id, "Capture deleted");
            projection.forget(Capture::KIND, request.id);
        }
        Ok(removed)
    }
}
