//! Line-delimited streaming response plumbing.

use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use hoptrace_core::{sink, StreamingTrace};
use std::convert::Infallible;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

/// Content type for a stream of independent JSON objects.
const STREAM_CONTENT_TYPE: &str = "application/stream+json";

/// Wraps a streaming trace into a line-per-event response body.
///
/// Each event is rendered as its own chunk, so hyper flushes it immediately.
/// A drop guard on the session's cancellation token rides along with the
/// body: when the client disconnects, hyper drops the stream, the guard
/// cancels the token, and the producer is torn down.
pub fn ndjson_response(trace: StreamingTrace) -> Response {
    let (events, _state, cancel) = trace.into_parts();
    let guard = cancel.drop_guard();

    let body = ReceiverStream::new(events).map(move |event| {
        let _ = &guard;
        let line = sink::event_line(&event)
            .unwrap_or_else(|err| format!("{{\"error\":\"failed to encode event: {err}\"}}\n"));
        Ok::<Bytes, Infallible>(Bytes::from(line))
    });

    (
        [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
        Body::from_stream(body),
    )
        .into_response()
}
