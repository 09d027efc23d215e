//! Handler capabilities and the per-discriminator handler registry

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Error a handler fails with; opaque to the dispatch loop.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of one handler invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// A capability the application supplies for one or more event kinds.
///
/// Handlers receive the decoded event union and pick out the variants they
/// care about. A returned error requeues the delivery, so the same message
/// arrives again later: handlers must be idempotent, and must apply either
/// all of their mutations or none.
#[async_trait]
pub trait EventHandler<E>: Send + Sync {
    async fn handle(&self, event: &E, cancellation: &CancellationToken) -> HandlerResult;
}

/// Maps a wire discriminator to the handlers interested in that event kind.
///
/// Several handlers may register for the same discriminator; the consumer
/// invokes them sequentially in registration order. A discriminator with no
/// handlers is not an error; the consumer acknowledges and drops those
/// deliveries.
pub struct HandlerRegistry<E> {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler<E>>>>,
}

impl<E> HandlerRegistry<E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `discriminator`, keeping earlier ones.
    pub fn register(&mut self, discriminator: &str, handler: Arc<dyn EventHandler<E>>) {
        self.handlers
            .entry(discriminator.to_string())
            .or_default()
            .push(handler);
    }

    /// Handlers for a discriminator, in registration order; empty when this
    /// process does not care about the event kind.
    pub fn handlers_for(&self, discriminator: &str) -> &[Arc<dyn EventHandler<E>>] {
        self.handlers
            .get(discriminator)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl<E> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for HandlerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(&str, usize)> = self
            .handlers
            .iter()
            .map(|(discriminator, handlers)| (discriminator.as_str(), handlers.len()))
            .collect();
        entries.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &entries)
            .finish()
    }
}
