//! # Function Registry
//!
//! The per-realm table of remotely callable named handlers. An explicit,
//! injectable object constructed at bootstrap and shared by reference -
//! there are no module-level singletons, which is also what makes the
//! test doubles in [`crate::fakes`] a registry with fakes rather than a
//! parallel code path.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use rpc_types::{CallEnvelope, FailureKind, ResponseEnvelope, SenderInfo};
use serde_json::Value;
use tracing::{debug, warn};

/// Future returned by a handler invocation.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// A registered handler: JSON args plus sender details in, JSON value out.
///
/// Handlers may be async; a synchronous failure and a rejected future
/// surface identically to the caller.
pub type Handler = Arc<dyn Fn(Vec<Value>, SenderInfo) -> HandlerFuture + Send + Sync>;

/// Box an async closure into a [`Handler`].
pub fn handler<F, Fut>(func: F) -> Handler
where
    F: Fn(Vec<Value>, SenderInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |args, sender| Box::pin(func(args, sender)))
}

/// Per-realm table mapping a function name to a local handler.
#[derive(Default)]
pub struct FunctionRegistry {
    handlers: RwLock<HashMap<String, Handler>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`.
    ///
    /// Registration is last-wins: a handler registered under an existing
    /// name replaces the previous one (logged), so re-running bootstrap
    /// after an extension reload stays idempotent.
    pub fn register(&self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        if self.handlers.write().insert(name.clone(), handler).is_some() {
            warn!(function = %name, "replacing previously registered RPC handler");
        }
    }

    /// Register an async closure without hand-rolling the boxing.
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(Vec<Value>, SenderInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(name, handler(func));
    }

    /// Remove a handler; returns whether one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.handlers.write().remove(name).is_some()
    }

    /// Look up a handler by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.handlers.read().get(name).cloned()
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Execute a request envelope and produce its response envelope.
    ///
    /// A missing function is a normal startup-race outcome and comes back
    /// as a failure envelope, not a local error. Handler failures are
    /// caught into the envelope the same way, so no error ever escapes
    /// into the message bus and leaves the caller waiting forever.
    pub async fn handle_request(
        &self,
        request: &CallEnvelope,
        sender: SenderInfo,
    ) -> ResponseEnvelope {
        let Some(handler) = self.lookup(&request.function) else {
            debug!(function = %request.function, "RPC for unregistered function");
            return ResponseEnvelope::failure(
                request,
                FailureKind::NoSuchFunction,
                format!("no such function registered for RPC: {}", request.function),
            );
        };
        match handler(request.args.clone(), sender).await {
            Ok(value) => ResponseEnvelope::success(request, value),
            Err(error) => {
                debug!(function = %request.function, %error, "RPC handler failed");
                ResponseEnvelope::failure(request, FailureKind::HandlerFailed, error.to_string())
            }
        }
    }
}
