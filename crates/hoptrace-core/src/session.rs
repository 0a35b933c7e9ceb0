//! Trace session orchestration.
//!
//! A [`TraceSession`] drives exactly one trace execution to a single terminal
//! outcome and guarantees the producer is released on every exit path,
//! including caller-initiated cancellation.

use crate::{
    EnrichedHop, Hop, HopEnricher, HopEvent, ProbeEngine, TraceConfig, TraceError, TraceResult,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Capacity of the session's outbound event channel.
const EVENT_BUFFER: usize = 16;

/// Lifecycle of a streaming trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TraceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One unit delivered to the streaming consumer: an enriched hop, or exactly
/// one terminal error. Cancellation and completion both end the stream with
/// no event.
#[derive(Debug)]
pub enum StreamEvent {
    Hop(EnrichedHop),
    Failed(TraceError),
}

/// Orchestrates one trace request.
pub struct TraceSession {
    engine: Arc<dyn ProbeEngine>,
    enricher: Option<Arc<dyn HopEnricher>>,
    request_id: Uuid,
}

impl TraceSession {
    pub fn new(engine: Arc<dyn ProbeEngine>, enricher: Option<Arc<dyn HopEnricher>>) -> Self {
        Self {
            engine,
            enricher,
            request_id: Uuid::new_v4(),
        }
    }

    /// Overrides the request correlation id (it defaults to a fresh v4 UUID).
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Runs a whole-path trace, enriching every hop in order.
    ///
    /// Returns the complete ordered hop list or the probe error verbatim; a
    /// failed trace never yields partial hops.
    pub async fn run_sync(
        &self,
        destination: &str,
        config: &TraceConfig,
    ) -> TraceResult<Vec<EnrichedHop>> {
        debug!(id = %self.request_id, target = destination, "starting synchronous trace");

        let hops = self.engine.trace(destination, config).await?;
        let mut enriched = Vec::with_capacity(hops.len());
        for hop in hops {
            enriched.push(enrich(&self.enricher, hop).await);
        }

        debug!(id = %self.request_id, hops = enriched.len(), "synchronous trace complete");
        Ok(enriched)
    }

    /// Starts a streaming trace: an engine producer task plus a consumer task
    /// that enriches and forwards each hop in production order.
    ///
    /// The consumer performs a three-way wait (cancellation, next engine
    /// event, downstream send) and reacts to whichever occurs first. Dropping
    /// the returned handle's receiver or cancelling its token moves the
    /// session to [`TraceState::Cancelled`] and stops the producer.
    pub fn run_stream(&self, destination: &str, config: &TraceConfig) -> StreamingTrace {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(TraceState::Idle);

        let mut events = self.engine.trace_stream(destination, config, cancel.clone());
        let enricher = self.enricher.clone();
        let consumer_cancel = cancel.clone();
        let request_id = self.request_id;
        let target = destination.to_string();

        tokio::spawn(async move {
            let _ = state_tx.send(TraceState::Running);
            debug!(id = %request_id, target = %target, "starting streaming trace");

            let terminal = loop {
                let event = tokio::select! {
                    _ = consumer_cancel.cancelled() => break TraceState::Cancelled,
                    event = events.recv() => event,
                };

                match event {
                    None => break TraceState::Completed,
                    Some(HopEvent::Failed(err)) => {
                        warn!(id = %request_id, error = %err, "probe failed mid-stream");
                        let _ = tx.send(StreamEvent::Failed(err)).await;
                        break TraceState::Failed;
                    }
                    Some(HopEvent::Hop(hop)) => {
                        let enriched = enrich(&enricher, hop).await;
                        tokio::select! {
                            _ = consumer_cancel.cancelled() => break TraceState::Cancelled,
                            sent = tx.send(StreamEvent::Hop(enriched)) => {
                                // A dropped receiver means the caller is gone.
                                if sent.is_err() {
                                    break TraceState::Cancelled;
                                }
                            }
                        }
                    }
                }
            };

            if terminal == TraceState::Cancelled {
                consumer_cancel.cancel();
            }
            debug!(id = %request_id, target = %target, state = ?terminal, "trace session finished");
            let _ = state_tx.send(terminal);
        });

        StreamingTrace {
            events: rx,
            state: state_rx,
            cancel,
        }
    }
}

async fn enrich(enricher: &Option<Arc<dyn HopEnricher>>, hop: Hop) -> EnrichedHop {
    match enricher {
        Some(enricher) => enricher.enrich(hop).await,
        None => EnrichedHop::bare(hop),
    }
}

/// Handle to an in-flight streaming trace.
pub struct StreamingTrace {
    events: mpsc::Receiver<StreamEvent>,
    state: watch::Receiver<TraceState>,
    cancel: CancellationToken,
}

impl StreamingTrace {
    /// Receives the next event; `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Signals the session and its producer to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The session's cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current session state.
    pub fn state(&self) -> TraceState {
        *self.state.borrow()
    }

    /// Waits for the session to reach a terminal state.
    pub async fn wait_terminal(&mut self) -> TraceState {
        loop {
            let state = *self.state.borrow_and_update();
            if state.is_terminal() {
                return state;
            }
            if self.state.changed().await.is_err() {
                return *self.state.borrow();
            }
        }
    }

    /// Splits the handle for transports that need to own the receiver.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<StreamEvent>,
        watch::Receiver<TraceState>,
        CancellationToken,
    ) {
        (self.events, self.state, self.cancel)
    }
}
