//! Result sinks: buffered report assembly and line-delimited rendering.

use crate::{EnrichedHop, StreamEvent, TraceError, TraceReport};
use serde::{Deserialize, Serialize};

/// JSON body used whenever only an error is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl From<&TraceError> for ErrorBody {
    fn from(err: &TraceError) -> Self {
        Self::new(err.to_string())
    }
}

/// Packages a fully collected trace into the buffered payload.
///
/// Callers only reach this once every hop (and its enrichment) is in hand; an
/// earlier failure surfaces as an error instead and discards partial hops.
pub fn collect_report(destination: impl Into<String>, hops: Vec<EnrichedHop>) -> TraceReport {
    TraceReport {
        destination: destination.into(),
        hops,
    }
}

/// Renders one hop as a newline-terminated JSON line.
pub fn hop_line(hop: &EnrichedHop) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(hop)?;
    line.push('\n');
    Ok(line)
}

/// Renders the terminal error as a newline-terminated JSON line.
pub fn error_line(err: &TraceError) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(&ErrorBody::from(err))?;
    line.push('\n');
    Ok(line)
}

/// Renders a stream event as its wire unit.
pub fn event_line(event: &StreamEvent) -> Result<String, serde_json::Error> {
    match event {
        StreamEvent::Hop(hop) => hop_line(hop),
        StreamEvent::Failed(err) => error_line(err),
    }
}
