//! Collaborator traits: the probe engine and the hop enricher.

use crate::{EnrichedHop, Hop, TraceConfig, TraceError, TraceResult};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One event emitted by a streaming probe producer.
///
/// Hops arrive in strictly increasing TTL order. At most one `Failed` event
/// is emitted, always last; normal completion closes the channel with no
/// terminal marker.
#[derive(Debug)]
pub enum HopEvent {
    Hop(Hop),
    Failed(TraceError),
}

/// The external path-probing capability.
///
/// Implementations own all probe mechanics (sockets, packets, per-probe
/// timeouts and retries per the [`TraceConfig`]); the core only consumes hop
/// events through this interface.
#[async_trait]
pub trait ProbeEngine: Send + Sync {
    /// Probes the whole path and returns the complete ordered hop list, or an
    /// error with no partial result.
    async fn trace(&self, destination: &str, config: &TraceConfig) -> TraceResult<Vec<Hop>>;

    /// Starts an independent producer task emitting hop events as they are
    /// discovered.
    ///
    /// The producer must observe `cancel` at every suspension point,
    /// including while blocked sending on a full or abandoned channel, and
    /// must release its resources promptly when cancelled or when the
    /// receiver is dropped.
    fn trace_stream(
        &self,
        destination: &str,
        config: &TraceConfig,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<HopEvent>;
}

/// Best-effort per-hop annotation.
///
/// Enrichment is strictly additive: implementations must never drop a hop or
/// alter its ttl/host/address/rtt, and must swallow their own failures.
#[async_trait]
pub trait HopEnricher: Send + Sync {
    async fn enrich(&self, hop: Hop) -> EnrichedHop;
}
