//! Best-effort GeoIP enrichment client.
//!
//! Looks up `{base_url}/ip/{address}` for each responding hop. Every failure
//! mode degrades the same way: the hop comes back without geolocation and
//! the trace is unaffected.

use async_trait::async_trait;
use hoptrace_core::{EnrichedHop, GeoInfo, Hop, HopEnricher};
use std::time::Duration;
use tracing::debug;

/// Per-lookup request timeout. Enrichment latency is part of the per-hop
/// emission latency in streaming mode, so lookups are kept short.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP client for a GeoIP lookup service.
pub struct GeoIpClient {
    base_url: String,
    http: reqwest::Client,
}

impl GeoIpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    fn lookup_url(&self, address: &str) -> String {
        format!("{}/ip/{}", self.base_url.trim_end_matches('/'), address)
    }

    /// Looks up geolocation for an address; failures yield empty info.
    pub async fn lookup(&self, address: &str) -> GeoInfo {
        if address.is_empty() {
            return GeoInfo::default();
        }

        match self.fetch(&self.lookup_url(address)).await {
            Ok(geo) => geo,
            Err(err) => {
                debug!(address = address, error = %err, "geoip lookup failed");
                GeoInfo::default()
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<GeoInfo, reqwest::Error> {
        self.http
            .get(url)
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json::<GeoInfo>()
            .await
    }
}

#[async_trait]
impl HopEnricher for GeoIpClient {
    async fn enrich(&self, hop: Hop) -> EnrichedHop {
        let geo = self.lookup(&hop.address).await;
        EnrichedHop { hop, geo }
    }
}
