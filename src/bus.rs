//! In-process fan-out of fetched samples to independent consumers.
//!
//! One bus instance exists per event type (sensor readings, weather
//! readings); handlers are invoked synchronously in registration order with
//! per-handler error isolation. There is no queueing, retry or persistence:
//! a sample published while a handler's store is down is simply logged as a
//! failed delivery for that handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::error::PipelineError;
use crate::models::Sample;

/// A consumer of fetched samples.
#[async_trait]
pub trait SampleHandler: Send + Sync {
    /// Stable identity used in failed-delivery logs.
    fn id(&self) -> &'static str;

    async fn handle(&self, sample: &Sample) -> Result<(), PipelineError>;
}

/// Ordered set of handlers for one event type.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Arc<dyn SampleHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; delivery order is registration order.
    pub fn subscribe(&mut self, handler: Arc<dyn SampleHandler>) {
        self.handlers.push(handler);
    }

    /// Deliver `sample` to every registered handler, in order.
    ///
    /// A failing handler is logged with its identity and does not stop
    /// delivery to the handlers registered after it.
    pub async fn publish(&self, sample: &Sample) {
        for handler in &self.handlers {
            if let Err(e) = handler.handle(sample).await {
                error!(
                    handler = handler.id(),
                    source = %sample.source_id,
                    error = %e,
                    "event handler failed"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
