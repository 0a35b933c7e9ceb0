//! End-to-end HTTP tests: a real listener on an ephemeral port, a scripted
//! probe engine, and a plain reqwest client.

use async_trait::async_trait;
use hoptrace_core::{
    EnrichedHop, GeoInfo, Hop, HopEnricher, HopEvent, ProbeEngine, TraceConfig, TraceError,
};
use hoptrace_server::{create_router, AppState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Scripted engine: replays hops, optionally fails, optionally never ends.
struct ScriptedEngine {
    hops: Vec<Hop>,
    failure: Option<String>,
    endless: bool,
    cancelled: Arc<AtomicBool>,
    probed: Arc<AtomicBool>,
}

impl ScriptedEngine {
    fn new(hops: Vec<Hop>) -> Self {
        Self {
            hops,
            failure: None,
            endless: false,
            cancelled: Arc::new(AtomicBool::new(false)),
            probed: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl ProbeEngine for ScriptedEngine {
    async fn trace(&self, _dest: &str, _config: &TraceConfig) -> Result<Vec<Hop>, TraceError> {
        self.probed.store(true, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(TraceError::Probe(reason.clone()));
        }
        Ok(self.hops.clone())
    }

    fn trace_stream(
        &self,
        _dest: &str,
        _config: &TraceConfig,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<HopEvent> {
        self.probed.store(true, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(4);
        let hops = self.hops.clone();
        let failure = self.failure.clone();
        let endless = self.endless;
        let cancelled = Arc::clone(&self.cancelled);

        tokio::spawn(async move {
            let mut ttl = 0u8;
            loop {
                let hop = if endless {
                    ttl = ttl.wrapping_add(1);
                    Hop {
                        ttl,
                        host: String::new(),
                        address: format!("10.0.0.{ttl}"),
                        rtt: 1.0,
                    }
                } else if (ttl as usize) < hops.len() {
                    let hop = hops[ttl as usize].clone();
                    ttl += 1;
                    hop
                } else {
                    break;
                };

                tokio::select! {
                    _ = cancel.cancelled() => {
                        cancelled.store(true, Ordering::SeqCst);
                        return;
                    }
                    sent = tx.send(HopEvent::Hop(hop)) => {
                        if sent.is_err() {
                            cancelled.store(true, Ordering::SeqCst);
                            return;
                        }
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => {
                        cancelled.store(true, Ordering::SeqCst);
                        return;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(20)) => {}
                }
            }

            if let Some(reason) = failure {
                let _ = tx.send(HopEvent::Failed(TraceError::Probe(reason))).await;
            }
        });

        rx
    }
}

/// Enricher that tags every responding hop with a fixed country.
struct StaticEnricher;

#[async_trait]
impl HopEnricher for StaticEnricher {
    async fn enrich(&self, hop: Hop) -> EnrichedHop {
        let geo = if hop.responded() {
            GeoInfo {
                country: Some("SE".to_string()),
                asn: Some(64501),
            }
        } else {
            GeoInfo::default()
        };
        EnrichedHop { hop, geo }
    }
}

fn path(n: u8) -> Vec<Hop> {
    (1..=n)
        .map(|ttl| Hop {
            ttl,
            host: format!("hop{ttl}.example.net"),
            address: format!("192.0.2.{ttl}"),
            rtt: ttl as f64,
        })
        .collect()
}

async fn serve(engine: ScriptedEngine, enricher: Option<Arc<dyn HopEnricher>>) -> String {
    let state = AppState::new(Arc::new(engine), enricher);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_traceroute_returns_full_report() {
    let base = serve(ScriptedEngine::new(path(3)), Some(Arc::new(StaticEnricher))).await;

    let resp = reqwest::get(format!("{base}/traceroute/example.com")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["destination"], "example.com");
    let hops = body["hops"].as_array().unwrap();
    assert_eq!(hops.len(), 3);
    for (i, hop) in hops.iter().enumerate() {
        assert_eq!(hop["ttl"], (i + 1) as u64);
        assert_eq!(hop["country"], "SE");
        assert_eq!(hop["asn"], 64501);
    }
}

#[tokio::test]
async fn test_validation_failure_is_400_naming_the_field() {
    let base = serve(ScriptedEngine::new(path(1)), None).await;

    let resp = reqwest::get(format!("{base}/traceroute/example.com?hops=500"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = resp.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("hops"));
    assert!(message.contains("255"));
}

#[tokio::test]
async fn test_unparseable_param_is_400() {
    let base = serve(ScriptedEngine::new(path(1)), None).await;

    let resp = reqwest::get(format!("{base}/traceroute/example.com?timeout=soon"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("timeout"));
}

#[tokio::test]
async fn test_probe_failure_is_500_with_error_body() {
    let mut engine = ScriptedEngine::new(Vec::new());
    engine.failure = Some("network unreachable".to_string());
    let base = serve(engine, None).await;

    let resp = reqwest::get(format!("{base}/traceroute/203.0.113.9?hops=5&timeout=200"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("network unreachable"));
}

#[tokio::test]
async fn test_stream_emits_one_json_line_per_hop() {
    let base = serve(ScriptedEngine::new(path(4)), Some(Arc::new(StaticEnricher))).await;

    let resp = reqwest::get(format!("{base}/stream/example.com")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/stream+json"
    );

    let text = resp.text().await.unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    for (i, line) in lines.iter().enumerate() {
        let hop: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(hop["ttl"], (i + 1) as u64);
        assert_eq!(hop["country"], "SE");
    }
}

#[tokio::test]
async fn test_stream_failure_ends_with_single_error_line() {
    let mut engine = ScriptedEngine::new(path(2));
    engine.failure = Some("engine fault".to_string());
    let base = serve(engine, None).await;

    let resp = reqwest::get(format!("{base}/stream/example.com")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let text = resp.text().await.unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("\"ttl\":1"));
    assert!(lines[1].contains("\"ttl\":2"));

    let last: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert!(last["error"].as_str().unwrap().contains("engine fault"));
}

#[tokio::test]
async fn test_stream_validation_failure_is_plain_400() {
    let base = serve(ScriptedEngine::new(path(1)), None).await;

    let resp = reqwest::get(format!("{base}/stream/example.com?port=70000"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("port"));
}

#[tokio::test]
async fn test_http10_stream_request_cannot_stream() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let engine = ScriptedEngine::new(path(3));
    let probed = Arc::clone(&engine.probed);
    let base = serve(engine, None).await;
    let addr = base.strip_prefix("http://").unwrap().to_string();

    // reqwest cannot speak HTTP/1.0, so write the request by hand.
    let mut conn = tokio::net::TcpStream::connect(&addr).await.unwrap();
    conn.write_all(b"GET /stream/example.com HTTP/1.0\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    conn.read_to_string(&mut response).await.unwrap();

    let status_line = response.lines().next().unwrap();
    assert!(status_line.contains("500"), "status line was: {status_line}");
    assert!(response.contains(r#"{"error":"Cannot stream"}"#));
    assert!(
        !probed.load(Ordering::SeqCst),
        "no probe may start for an unstreamable request"
    );
}

#[tokio::test]
async fn test_client_disconnect_cancels_producer() {
    let mut engine = ScriptedEngine::new(Vec::new());
    engine.endless = true;
    let cancelled = Arc::clone(&engine.cancelled);
    let base = serve(engine, None).await;

    let mut resp = reqwest::get(format!("{base}/stream/example.com")).await.unwrap();
    let first = resp.chunk().await.unwrap().expect("one hop before hangup");
    assert!(std::str::from_utf8(&first).unwrap().contains("\"ttl\""));

    // Hang up mid-stream.
    drop(resp);

    tokio::time::timeout(Duration::from_secs(2), async {
        while !cancelled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("producer should observe cancellation after client disconnect");
}

#[tokio::test]
async fn test_health() {
    let base = serve(ScriptedEngine::new(Vec::new()), None).await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}
