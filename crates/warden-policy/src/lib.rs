//! Policy document model, JSON/YAML parser, and the deterministic rule &
//! policy engine (spec.md §4.1, §4.3).
//!
//! Selection, ordering, matching, and cross-policy synthesis are all
//! pure over a replaceable snapshot of the active corpus — see
//! [`engine::Engine`] for the algorithm (spec.md §4.3 steps 1–7).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod model;
pub mod observer;
pub mod parser;

pub use engine::{Decision, Engine, EvaluationRequest, TraceEntry};
pub use model::{Action, DecisionOutcome, Policy, PolicyRule, PolicyStatus};
pub use parser::{load_file, parse_json, parse_yaml, validate, Violation};
