//! Trace configuration and its validated option builder.

use crate::{TraceError, TraceResult};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 33434;
pub const DEFAULT_MAX_HOPS: u8 = 64;
pub const DEFAULT_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_RETRIES: u8 = 3;
pub const DEFAULT_PACKET_SIZE: u16 = 52;

/// Configuration for a single trace. Immutable once built: the only ways to
/// obtain one are [`TraceConfig::default`] and [`TraceConfig::build`], both of
/// which guarantee every field is within bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    /// Destination port.
    pub port: u16,
    /// Maximum TTL to probe.
    pub max_hops: u8,
    /// Timeout per probe in milliseconds.
    pub timeout_ms: u64,
    /// Probe retries per hop.
    pub retries: u8,
    /// Probe packet size in bytes.
    pub packet_size: u16,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_hops: DEFAULT_MAX_HOPS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
            packet_size: DEFAULT_PACKET_SIZE,
        }
    }
}

impl TraceConfig {
    /// Builds a configuration by folding the given options over the defaults.
    ///
    /// Options are applied in canonical field order (port, hops, timeout,
    /// retries, size) regardless of input order. The first out-of-range option
    /// aborts the build; later options are never applied and no partial
    /// configuration is returned.
    pub fn build(opts: &[TraceOpt]) -> TraceResult<Self> {
        let mut ordered = opts.to_vec();
        ordered.sort_by_key(TraceOpt::rank);

        let mut config = Self::default();
        for opt in &ordered {
            opt.apply(&mut config)?;
        }
        Ok(config)
    }

    /// The per-probe timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A named, validated mutation of one [`TraceConfig`] field.
///
/// Payloads are wide integers so that out-of-range request values (port
/// 70000, negative hop counts) stay representable until validation rejects
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOpt {
    Port(i64),
    Hops(i64),
    TimeoutMs(i64),
    Retries(i64),
    PacketSize(i64),
}

impl TraceOpt {
    /// The configuration field this option targets.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Port(_) => "port",
            Self::Hops(_) => "hops",
            Self::TimeoutMs(_) => "timeout",
            Self::Retries(_) => "retries",
            Self::PacketSize(_) => "size",
        }
    }

    /// Canonical application order.
    fn rank(&self) -> u8 {
        match self {
            Self::Port(_) => 0,
            Self::Hops(_) => 1,
            Self::TimeoutMs(_) => 2,
            Self::Retries(_) => 3,
            Self::PacketSize(_) => 4,
        }
    }

    fn apply(&self, config: &mut TraceConfig) -> TraceResult<()> {
        match *self {
            Self::Port(v) => config.port = bounded(self.field(), v, 1, 65535)? as u16,
            Self::Hops(v) => config.max_hops = bounded(self.field(), v, 1, 255)? as u8,
            Self::TimeoutMs(v) => config.timeout_ms = bounded(self.field(), v, 1, 5000)? as u64,
            Self::Retries(v) => config.retries = bounded(self.field(), v, 1, 5)? as u8,
            Self::PacketSize(v) => config.packet_size = bounded(self.field(), v, 1, 1400)? as u16,
        }
        Ok(())
    }
}

fn bounded(field: &'static str, value: i64, min: i64, max: i64) -> TraceResult<i64> {
    if value < min || value > max {
        return Err(TraceError::InvalidOption {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TraceConfig::build(&[]).unwrap();
        assert_eq!(config.port, 33434);
        assert_eq!(config.max_hops, 64);
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.retries, 3);
        assert_eq!(config.packet_size, 52);
        assert_eq!(config, TraceConfig::default());
    }

    #[test]
    fn test_in_bound_options_land_verbatim() {
        let config = TraceConfig::build(&[
            TraceOpt::Hops(5),
            TraceOpt::TimeoutMs(200),
            TraceOpt::Port(443),
        ])
        .unwrap();
        assert_eq!(config.port, 443);
        assert_eq!(config.max_hops, 5);
        assert_eq!(config.timeout_ms, 200);
        // Unspecified fields keep their defaults.
        assert_eq!(config.retries, 3);
        assert_eq!(config.packet_size, 52);
    }

    #[test]
    fn test_out_of_range_values_fail() {
        for opt in [
            TraceOpt::Hops(0),
            TraceOpt::Hops(256),
            TraceOpt::Port(0),
            TraceOpt::Port(70000),
            TraceOpt::TimeoutMs(0),
            TraceOpt::TimeoutMs(5001),
            TraceOpt::Retries(0),
            TraceOpt::Retries(6),
            TraceOpt::PacketSize(0),
            TraceOpt::PacketSize(1401),
        ] {
            let result = TraceConfig::build(&[opt]);
            assert!(result.is_err(), "{opt:?} should fail validation");
        }
    }

    #[test]
    fn test_negative_values_fail() {
        assert!(TraceConfig::build(&[TraceOpt::Hops(-1)]).is_err());
        assert!(TraceConfig::build(&[TraceOpt::TimeoutMs(-500)]).is_err());
    }

    #[test]
    fn test_canonical_order_and_short_circuit() {
        // Port is validated before hops even though hops comes first in the
        // input; the reported failure must name the port.
        let err = TraceConfig::build(&[TraceOpt::Hops(300), TraceOpt::Port(0)]).unwrap_err();
        match err {
            TraceError::InvalidOption { field, value, .. } => {
                assert_eq!(field, "port");
                assert_eq!(value, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_later_duplicate_wins() {
        let config =
            TraceConfig::build(&[TraceOpt::Port(1000), TraceOpt::Port(2000)]).unwrap();
        assert_eq!(config.port, 2000);
    }

    #[test]
    fn test_option_fields() {
        assert_eq!(TraceOpt::Port(1).field(), "port");
        assert_eq!(TraceOpt::Hops(1).field(), "hops");
        assert_eq!(TraceOpt::TimeoutMs(1).field(), "timeout");
        assert_eq!(TraceOpt::Retries(1).field(), "retries");
        assert_eq!(TraceOpt::PacketSize(1).field(), "size");
    }
}
