//! Hop and report types.
//!
//! These types define the JSON wire format of the service: one flat object
//! per hop, with geolocation fields present only when known.

use serde::{Deserialize, Serialize};

/// A single hop along the probed path.
///
/// `host` and `address` are empty and `rtt` is 0.0 when every probe at this
/// TTL timed out; such a hop is still a valid entry in the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    /// 1-based position along the path.
    pub ttl: u8,
    /// Reverse-resolved name, may equal the address.
    pub host: String,
    /// Textual network address of the responder.
    pub address: String,
    /// Round-trip time in milliseconds.
    pub rtt: f64,
}

impl Hop {
    /// A hop whose probes all timed out.
    pub fn timed_out(ttl: u8) -> Self {
        Self {
            ttl,
            host: String::new(),
            address: String::new(),
            rtt: 0.0,
        }
    }

    /// Whether any probe at this TTL got an answer.
    pub fn responded(&self) -> bool {
        !self.address.is_empty()
    }
}

/// Geolocation metadata for a hop. Both fields are omitted from JSON when
/// unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
}

impl GeoInfo {
    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.asn.is_none()
    }
}

/// A hop plus its best-effort geolocation, serialized as one flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedHop {
    #[serde(flatten)]
    pub hop: Hop,
    #[serde(flatten)]
    pub geo: GeoInfo,
}

impl EnrichedHop {
    /// A hop with no geolocation attached.
    pub fn bare(hop: Hop) -> Self {
        Self {
            hop,
            geo: GeoInfo::default(),
        }
    }
}

/// The complete result of one synchronous trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    pub destination: String,
    pub hops: Vec<EnrichedHop>,
}
