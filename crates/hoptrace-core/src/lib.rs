//! Core types, traits, and orchestration for hoptrace.
//!
//! This crate provides the fundamental abstractions used throughout the
//! service:
//!
//! - [`TraceConfig`] and its validated option builder
//! - [`ProbeEngine`] and [`HopEnricher`] traits for the external collaborators
//! - [`TraceSession`] which drives one trace to a single terminal outcome
//! - Result sinks for buffered and line-delimited streamed delivery

pub mod config;
pub mod engine;
pub mod error;
pub mod hop;
pub mod session;
pub mod sink;

pub use config::{TraceConfig, TraceOpt};
pub use engine::{HopEnricher, HopEvent, ProbeEngine};
pub use error::{TraceError, TraceResult};
pub use hop::{EnrichedHop, GeoInfo, Hop, TraceReport};
pub use session::{StreamEvent, StreamingTrace, TraceSession, TraceState};
pub use sink::ErrorBody;
