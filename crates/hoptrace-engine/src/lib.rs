//! Probe engine backed by the system `traceroute(8)` binary.
//!
//! All packet mechanics stay inside the external program; this crate spawns
//! it with the configured bounds, parses its numeric output incrementally,
//! and optionally reverse-resolves responding addresses.

mod parser;
mod system;

pub use system::SystemEngine;
