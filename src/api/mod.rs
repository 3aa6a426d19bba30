mod error;
mod handlers;
pub mod middleware;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::mediator::{Dispatcher, Request};

/// Shared state for every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling `shutdown` cancels every in-flight request.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Dispatch with a cancellation token scoped to this request.
    pub async fn send<R: Request>(&self, request: R) -> Result<R::Response, ApiError> {
        let cancel = self.shutdown.child_token();
        Ok(self.dispatcher.send(request, &cancel).await?)
    }
}

pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let mut api = Router::new();

    // Captures, also served as items
    for prefix in ["/captures", "/items"] {
        api = api
            .route(
                prefix,
                get(handlers::list_captures).post(handlers::create_capture),
            )
            .route(
                &format!("{prefix}/{{id}}"),
                get(handlers::get_capture)
                    .put(handlers::update_capture)
                    .delete(handlers::delete_capture),
            );
    }

    let api = api
        // Collections
        .route(
            "/collections",
            get(handlers::list_collections).post(handlers::create_collection),
        )
        .route(
            "/collections/{id}",
            get(handlers::get_collection)
                .put(handlers::update_collection)
                .delete(handlers::delete_collection),
        )
        // Type inference
        .route("/type-inference/infer", post(handlers::infer_type))
        .route("/type-inference/confirm", post(handlers::confirm_type))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
