//! Decision event envelope, confidence scoring, and the single-flight
//! TTL decision cache (spec.md §4.7, §4.9).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod event;

pub use cache::{cache_key, DecisionCache};
pub use event::{
    build_event, confidence, ConfidenceInputs, DecisionEvent, DecisionType, ExecutionRef,
};
