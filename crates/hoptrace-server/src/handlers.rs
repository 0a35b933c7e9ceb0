//! HTTP request handlers.

use crate::{stream, AppState};
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Version},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hoptrace_core::{sink, ErrorBody, TraceConfig, TraceError, TraceOpt, TraceReport};
use serde::Deserialize;
use tracing::{info, Instrument};

/// Query parameters for both trace endpoints.
///
/// Values stay raw strings so an unparseable number can be reported in our
/// own error body instead of the extractor's.
#[derive(Debug, Default, Deserialize)]
pub struct TraceQuery {
    pub port: Option<String>,
    pub hops: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<String>,
    pub size: Option<String>,
}

/// Converts the query parameters into trace options. Absent parameters stay
/// absent; defaults are the config builder's business.
pub fn query_to_opts(query: &TraceQuery) -> Result<Vec<TraceOpt>, TraceError> {
    let mut opts = Vec::new();

    if let Some(value) = parse_param("port", &query.port)? {
        opts.push(TraceOpt::Port(value));
    }
    if let Some(value) = parse_param("hops", &query.hops)? {
        opts.push(TraceOpt::Hops(value));
    }
    if let Some(value) = parse_param("timeout", &query.timeout)? {
        opts.push(TraceOpt::TimeoutMs(value));
    }
    if let Some(value) = parse_param("retries", &query.retries)? {
        opts.push(TraceOpt::Retries(value));
    }
    if let Some(value) = parse_param("size", &query.size)? {
        opts.push(TraceOpt::PacketSize(value));
    }

    Ok(opts)
}

fn parse_param(name: &'static str, raw: &Option<String>) -> Result<Option<i64>, TraceError> {
    match raw {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| TraceError::InvalidParam {
            name,
            value: raw.clone(),
        }),
    }
}

/// Error wrapper mapping [`TraceError`] onto HTTP responses.
pub struct ApiError(TraceError);

impl From<TraceError> for ApiError {
    fn from(err: TraceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

/// Creates the router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/traceroute/{dest}", get(handle_traceroute))
        .route("/stream/{dest}", get(handle_stream))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn handle_health() -> &'static str {
    "ok"
}

/// Handles GET /traceroute/{dest}: one atomic JSON payload.
async fn handle_traceroute(
    State(state): State<AppState>,
    Path(dest): Path<String>,
    Query(query): Query<TraceQuery>,
) -> Result<Json<TraceReport>, ApiError> {
    let opts = query_to_opts(&query)?;
    let config = TraceConfig::build(&opts)?;

    let session = state.session();
    let span = tracing::info_span!("traceroute", id = %session.request_id(), target = %dest);
    info!(parent: &span, port = config.port, max_hops = config.max_hops, "running trace");

    let hops = session.run_sync(&dest, &config).instrument(span).await?;
    Ok(Json(sink::collect_report(dest, hops)))
}

/// Handles GET /stream/{dest}: one JSON object per hop, flushed as emitted.
async fn handle_stream(
    State(state): State<AppState>,
    version: Version,
    Path(dest): Path<String>,
    Query(query): Query<TraceQuery>,
) -> Result<Response, ApiError> {
    // Pre-1.1 transports cannot carry an unframed incremental body.
    if version < Version::HTTP_11 {
        return Err(TraceError::StreamingUnsupported.into());
    }

    let opts = query_to_opts(&query)?;
    let config = TraceConfig::build(&opts)?;

    let session = state.session();
    info!(
        id = %session.request_id(),
        target = %dest,
        port = config.port,
        "starting streaming trace"
    );

    Ok(stream::ndjson_response(session.run_stream(&dest, &config)))
}
