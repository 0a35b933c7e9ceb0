//! HTTP server binary for hoptrace.

use clap::Parser;
use hoptrace_core::HopEnricher;
use hoptrace_engine::SystemEngine;
use hoptrace_geoip::GeoIpClient;
use hoptrace_server::{create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;

/// hoptrace HTTP server.
#[derive(Parser, Debug)]
#[command(name = "hoptrace-server")]
#[command(version)]
#[command(about = "HTTP API exposing hop-by-hop network path diagnostics")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "HOPTRACE_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Base URL of the GeoIP lookup service; enrichment is disabled when
    /// unset.
    #[arg(long = "geoip-url", env = "HOPTRACE_GEOIP_URL")]
    geoip_url: Option<String>,

    /// Reverse-resolve hop addresses.
    #[arg(long = "reverse-dns", env = "HOPTRACE_REVERSE_DNS")]
    reverse_dns: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", env = "HOPTRACE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .init();

    let addr: SocketAddr = args.bind.parse().unwrap_or_else(|_| {
        eprintln!("Invalid bind address: {}", args.bind);
        std::process::exit(1);
    });

    let engine = Arc::new(SystemEngine::new().with_reverse_dns(args.reverse_dns));
    let enricher: Option<Arc<dyn HopEnricher>> = args.geoip_url.map(|url| {
        tracing::info!(url = %url, "geoip enrichment enabled");
        Arc::new(GeoIpClient::new(url)) as Arc<dyn HopEnricher>
    });

    let router = create_router(AppState::new(engine, enricher));

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind to {}: {}", addr, e);
        std::process::exit(1);
    });

    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, router).await.unwrap_or_else(|e| {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    });
}
