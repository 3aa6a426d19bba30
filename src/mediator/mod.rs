//! Typed command/query dispatch.
//!
//! A [`Dispatcher`] routes each request value to the single [`Handler`]
//! registered for its Rust type. Before the handler runs, every
//! [`Validator`] registered for that type is run concurrently; any failure
//! rejects the request with [`ValidationFailed`] and the handler is never
//! invoked.
//!
//! Registrations are collected by a [`DispatcherBuilder`] at startup. There
//! is no global registry.
//!
//! ```ignore
//! let dispatcher = DispatcherBuilder::new()
//!     .handler::<CreateCapture>(captures.clone())
//!     .validator::<CreateCapture>(Arc::new(TextRequired))
//!     .require::<CreateCapture>()
//!     .build()?;
//!
//! let capture = dispatcher.send(CreateCapture { input }, &cancel).await?;
//! ```

mod validation;

pub use validation::{ensure_active, Cancelled, ValidationFailed, ValidationFailure, Validator};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A command or query that can be dispatched.
pub trait Request: Send + Sync + 'static {
    type Response: Send + 'static;
}

/// Business logic for one request type.
#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, request: R, cancel: &CancellationToken) -> anyhow::Result<R::Response>;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for {0}")]
    NoHandler(&'static str),

    #[error("{count} handlers registered for {request}")]
    AmbiguousHandler { request: &'static str, count: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Validation(#[from] ValidationFailed),

    /// An error returned by the handler, passed through as-is.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl From<Cancelled> for DispatchError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

type HandlerSlot<R> = Arc<dyn Handler<R>>;
type ValidatorList<R> = Vec<Arc<dyn Validator<R>>>;
type Erased = Box<dyn Any + Send + Sync>;

struct Registration {
    request: &'static str,
    handlers: Vec<Erased>,
}

/// Collects handler and validator registrations.
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<TypeId, Registration>,
    validators: HashMap<TypeId, Erased>,
    required: Vec<(TypeId, &'static str)>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler<R: Request>(mut self, handler: Arc<dyn Handler<R>>) -> Self {
        self.handlers
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Registration {
                request: request_name::<R>(),
                handlers: Vec::new(),
            })
            .handlers
            .push(Box::new(handler as HandlerSlot<R>));
        self
    }

    pub fn validator<R: Request>(mut self, validator: Arc<dyn Validator<R>>) -> Self {
        let list = self
            .validators
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(ValidatorList::<R>::new()));
        if let Some(list) = list.downcast_mut::<ValidatorList<R>>() {
            list.push(validator);
        }
        self
    }

    /// Declare that the process must be able to serve `R`. [`build`] fails if
    /// no handler was registered for it.
    ///
    /// [`build`]: DispatcherBuilder::build
    pub fn require<R: Request>(mut self) -> Self {
        self.required.push((TypeId::of::<R>(), request_name::<R>()));
        self
    }

    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        for (type_id, request) in &self.required {
            if !self.handlers.contains_key(type_id) {
                return Err(DispatchError::NoHandler(request));
            }
        }

        let mut handlers = HashMap::with_capacity(self.handlers.len());
        for (type_id, mut registration) in self.handlers {
            if registration.handlers.len() != 1 {
                return Err(DispatchError::AmbiguousHandler {
                    request: registration.request,
                    count: registration.handlers.len(),
                });
            }
            if let Some(handler) = registration.handlers.pop() {
                handlers.insert(type_id, handler);
            }
        }

        Ok(Dispatcher {
            handlers,
            validators: self.validators,
        })
    }
}

/// Routes requests to their handler through the validation stage.
pub struct Dispatcher {
    handlers: HashMap<TypeId, Erased>,
    validators: HashMap<TypeId, Erased>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub async fn send<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let name = request_name::<R>();
        let handler = self
            .handlers
            .get(&TypeId::of::<R>())
            .and_then(|h| h.downcast_ref::<HandlerSlot<R>>())
            .ok_or(DispatchError::NoHandler(name))?;

        let validators = self
            .validators
            .get(&TypeId::of::<R>())
            .and_then(|v| v.downcast_ref::<ValidatorList<R>>())
            .map(Vec::as_slice)
            .unwrap_or_default();

        tracing::debug!(request = name, validators = validators.len(), "dispatching");

        if let Err(err) = validation::run(validators, &request, cancel).await {
            if let DispatchError::Validation(failed) = &err {
                tracing::debug!(
                    request = name,
                    failures = failed.failures().len(),
                    "request rejected by validation"
                );
            }
            return Err(err);
        }

        handler
            .handle(request, cancel)
            .await
            .map_err(DispatchError::Handler)
    }
}

/// The request's type name without its module path. Generic arguments are
/// kept as written.
fn request_name<R: 'static>() -> &'static str {
    short_name(std::any::type_name::<R>())
}

fn short_name(full: &str) -> &str {
    let path = full.find('<').map_or(full, |lt| &full[..lt]);
    match path.rfind("::") {
        Some(sep) => &full[sep + 2..],
        None => full,
    }
}
