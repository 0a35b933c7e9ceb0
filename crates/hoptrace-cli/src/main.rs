//! Command line front end for hoptrace.

use clap::Parser;
use hoptrace_core::{sink, HopEnricher, StreamEvent, TraceConfig, TraceOpt, TraceSession};
use hoptrace_engine::SystemEngine;
use hoptrace_geoip::GeoIpClient;
use std::process::ExitCode;
use std::sync::Arc;

/// hoptrace - hop-by-hop network path diagnostics.
#[derive(Parser, Debug)]
#[command(name = "hoptrace")]
#[command(version)]
#[command(about = "Trace the network path to a destination")]
struct Args {
    /// Target hostname or IP address.
    #[arg(required = true)]
    destination: String,

    /// Destination port.
    #[arg(short, long)]
    port: Option<i64>,

    /// Maximum number of hops.
    #[arg(short = 'm', long)]
    hops: Option<i64>,

    /// Timeout per probe in milliseconds.
    #[arg(short, long)]
    timeout: Option<i64>,

    /// Probe retries per hop.
    #[arg(short, long)]
    retries: Option<i64>,

    /// Probe packet size in bytes.
    #[arg(short, long)]
    size: Option<i64>,

    /// Base URL of a GeoIP lookup service.
    #[arg(long = "geoip-url", env = "HOPTRACE_GEOIP_URL")]
    geoip_url: Option<String>,

    /// Reverse-resolve hop addresses.
    #[arg(long = "reverse-dns")]
    reverse_dns: bool,

    /// Print each hop as a JSON line the moment it is discovered.
    #[arg(long)]
    stream: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn to_opts(&self) -> Vec<TraceOpt> {
        let mut opts = Vec::new();
        if let Some(port) = self.port {
            opts.push(TraceOpt::Port(port));
        }
        if let Some(hops) = self.hops {
            opts.push(TraceOpt::Hops(hops));
        }
        if let Some(timeout) = self.timeout {
            opts.push(TraceOpt::TimeoutMs(timeout));
        }
        if let Some(retries) = self.retries {
            opts.push(TraceOpt::Retries(retries));
        }
        if let Some(size) = self.size {
            opts.push(TraceOpt::PacketSize(size));
        }
        opts
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if args.verbose { "debug" } else { "warn" })
        .init();

    let config = match TraceConfig::build(&args.to_opts()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let engine = Arc::new(SystemEngine::new().with_reverse_dns(args.reverse_dns));
    let enricher: Option<Arc<dyn HopEnricher>> = args
        .geoip_url
        .as_ref()
        .map(|url| Arc::new(GeoIpClient::new(url.clone())) as Arc<dyn HopEnricher>);
    let session = TraceSession::new(engine, enricher);

    if args.stream {
        run_streaming(&session, &args.destination, &config).await
    } else {
        run_buffered(&session, &args.destination, &config).await
    }
}

async fn run_buffered(session: &TraceSession, destination: &str, config: &TraceConfig) -> ExitCode {
    match session.run_sync(destination, config).await {
        Ok(hops) => {
            let report = sink::collect_report(destination, hops);
            match serde_json::to_string_pretty(&report) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("Failed to serialize report: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        Err(err) => {
            eprintln!("Trace failed: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_streaming(
    session: &TraceSession,
    destination: &str,
    config: &TraceConfig,
) -> ExitCode {
    let mut trace = session.run_stream(destination, config);
    let mut failed = false;

    while let Some(event) = trace.recv().await {
        failed |= matches!(event, StreamEvent::Failed(_));
        match sink::event_line(&event) {
            Ok(line) => print!("{line}"),
            Err(err) => eprintln!("Failed to serialize event: {err}"),
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
