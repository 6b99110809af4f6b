//! Shared primitives for the policy decision point core.
//!
//! This crate carries the pieces every other `warden-*` crate needs and
//! that don't belong to any single evaluation component: a dynamic value
//! type for evaluation-context data, id/clock helpers, canonical JSON and
//! fingerprinting, and the facade traits the core exposes to its host.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Version of the warden core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod facade;
pub mod fingerprint;
pub mod ids;
pub mod value;

pub use facade::{Ack, Clock, IdSource, PolicySource, RecordSink, SystemClock, TelemetrySink, UuidSource};
pub use fingerprint::{canonical_json, inputs_hash};
pub use ids::hour_and_weekday;
pub use value::Value;
