//! The `traceroute(8)`-backed engine.

use crate::parser;
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hoptrace_core::{Hop, HopEvent, ProbeEngine, TraceConfig, TraceError, TraceResult};
use std::net::IpAddr;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Capacity of the producer's event channel.
const EVENT_BUFFER: usize = 16;

/// Probe engine that shells out to the system `traceroute` binary.
///
/// One child process per trace, owned entirely by the producer task and
/// killed on cancellation (`kill_on_drop` is set as a backstop).
pub struct SystemEngine {
    binary: String,
    reverse_dns: bool,
}

impl SystemEngine {
    pub fn new() -> Self {
        Self {
            binary: "traceroute".to_string(),
            reverse_dns: false,
        }
    }

    /// Overrides the binary to execute.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Enables reverse DNS resolution of responding hop addresses.
    pub fn with_reverse_dns(mut self, reverse_dns: bool) -> Self {
        self.reverse_dns = reverse_dns;
        self
    }

    fn spawn(&self, destination: &str, config: &TraceConfig) -> TraceResult<Child> {
        // -w takes seconds; GNU traceroute accepts fractions.
        let wait_secs = config.timeout().as_secs_f64().max(0.1);

        let mut command = Command::new(&self.binary);
        command
            .arg("-n")
            .arg("-q")
            .arg(config.retries.to_string())
            .arg("-m")
            .arg(config.max_hops.to_string())
            .arg("-w")
            .arg(format!("{wait_secs:.1}"))
            .arg("-p")
            .arg(config.port.to_string())
            .arg(destination)
            .arg(config.packet_size.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.binary, target = destination, "spawning traceroute");
        command.spawn().map_err(TraceError::EngineSpawn)
    }
}

impl Default for SystemEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeEngine for SystemEngine {
    async fn trace(&self, destination: &str, config: &TraceConfig) -> TraceResult<Vec<Hop>> {
        let mut events = self.trace_stream(destination, config, CancellationToken::new());

        let mut hops = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                HopEvent::Hop(hop) => hops.push(hop),
                HopEvent::Failed(err) => return Err(err),
            }
        }
        Ok(hops)
    }

    fn trace_stream(
        &self,
        destination: &str,
        config: &TraceConfig,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<HopEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        match self.spawn(destination, config) {
            Ok(child) => {
                let reverse_dns = self.reverse_dns;
                tokio::spawn(async move {
                    produce(child, tx, cancel, reverse_dns).await;
                });
            }
            Err(err) => {
                // Channel is empty, so this cannot fail.
                let _ = tx.try_send(HopEvent::Failed(err));
            }
        }

        rx
    }
}

/// Reads the child's output line by line, emitting hops until exhaustion,
/// failure, or cancellation.
async fn produce(
    mut child: Child,
    tx: mpsc::Sender<HopEvent>,
    cancel: CancellationToken,
    reverse_dns: bool,
) {
    let Some(stdout) = child.stdout.take() else {
        let _ = tx
            .send(HopEvent::Failed(TraceError::Probe(
                "traceroute stdout not captured".to_string(),
            )))
            .await;
        return;
    };
    let mut lines = BufReader::new(stdout).lines();

    let resolver = if reverse_dns {
        match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => Some(resolver),
            Err(err) => {
                warn!(error = %err, "reverse DNS disabled: no system resolver");
                None
            }
        }
    } else {
        None
    };

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("trace cancelled, killing traceroute");
                let _ = child.kill().await;
                return;
            }
            next = lines.next_line() => next,
        };

        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                let _ = child.kill().await;
                let _ = tx.send(HopEvent::Failed(TraceError::EngineSpawn(err))).await;
                return;
            }
        };

        let Some(mut hop) = parser::parse_hop_line(&line) else {
            trace!(line = %line, "skipping non-hop output line");
            continue;
        };

        if hop.responded() {
            hop.host = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return;
                }
                host = resolve_host(&resolver, &hop.address) => host,
            };
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return;
            }
            sent = tx.send(HopEvent::Hop(hop)) => {
                if sent.is_err() {
                    let _ = child.kill().await;
                    return;
                }
            }
        }
    }

    // Output exhausted: a non-zero exit turns into the terminal error.
    let stderr = read_stderr(&mut child).await;
    match child.wait().await {
        Ok(status) if status.success() => {}
        Ok(status) => {
            let reason = if stderr.trim().is_empty() {
                format!("traceroute exited with {status}")
            } else {
                stderr.trim().to_string()
            };
            let _ = tx.send(HopEvent::Failed(TraceError::Probe(reason))).await;
        }
        Err(err) => {
            let _ = tx.send(HopEvent::Failed(TraceError::EngineSpawn(err))).await;
        }
    }
}

async fn resolve_host(resolver: &Option<TokioAsyncResolver>, address: &str) -> String {
    if let Some(resolver) = resolver {
        if let Ok(ip) = address.parse::<IpAddr>() {
            if let Ok(names) = resolver.reverse_lookup(ip).await {
                if let Some(name) = names.iter().next() {
                    return name.to_string().trim_end_matches('.').to_string();
                }
            }
        }
    }
    address.to_string()
}

async fn read_stderr(child: &mut Child) -> String {
    let mut buf = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut buf).await;
    }
    buf
}
