//! HTTP REST API server for hoptrace.

mod handlers;
mod stream;

pub use handlers::create_router;

use hoptrace_core::{HopEnricher, ProbeEngine, TraceSession};
use std::sync::Arc;

/// Shared handler state: the collaborators every request session is built
/// from. Both are safe for concurrent independent calls.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<dyn ProbeEngine>,
    enricher: Option<Arc<dyn HopEnricher>>,
}

impl AppState {
    pub fn new(engine: Arc<dyn ProbeEngine>, enricher: Option<Arc<dyn HopEnricher>>) -> Self {
        Self { engine, enricher }
    }

    /// A fresh session (and correlation id) for one request.
    pub fn session(&self) -> TraceSession {
        TraceSession::new(Arc::clone(&self.engine), self.enricher.clone())
    }
}
