//! Parser for `traceroute -n` output lines.

use hoptrace_core::Hop;
use std::net::IpAddr;

/// Parses one output line into a hop.
///
/// Returns `None` for lines that are not hop lines (the header, continuation
/// lines for per-probe responder changes, blank lines). A hop line starts
/// with the TTL; a line whose probes all timed out (`N  * * *`) becomes a
/// hop with an empty address and zero RTT. Of multi-probe lines only the
/// first responding address and its first RTT are kept.
pub(crate) fn parse_hop_line(line: &str) -> Option<Hop> {
    let mut tokens = line.split_whitespace();
    let ttl: u8 = tokens.next()?.parse().ok()?;

    let tokens: Vec<&str> = tokens.collect();
    let mut address: Option<&str> = None;
    let mut rtt: Option<f64> = None;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];

        if token == "*" || token.starts_with('!') {
            i += 1;
            continue;
        }

        if address.is_none() && token.parse::<IpAddr>().is_ok() {
            address = Some(token);
            i += 1;
            continue;
        }

        if rtt.is_none() {
            if let Some(value) = token.strip_suffix("ms") {
                if let Ok(value) = value.parse::<f64>() {
                    rtt = Some(value);
                }
            } else if let Ok(value) = token.parse::<f64>() {
                if tokens.get(i + 1) == Some(&"ms") {
                    rtt = Some(value);
                    i += 1;
                }
            }
        }

        i += 1;
    }

    match address {
        Some(address) => Some(Hop {
            ttl,
            host: String::new(),
            address: address.to_string(),
            rtt: rtt.unwrap_or(0.0),
        }),
        None => Some(Hop::timed_out(ttl)),
    }
}
