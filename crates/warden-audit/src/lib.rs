//! Execution span tree and append-only, hash-chained policy audit log
//! (spec.md §4.8).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod spans;

pub use chain::{hash_null, hash_policy, AuditAction, AuditEntry, AuditLog, AuditLogError, ChainGap};
pub use spans::{Artifact, ExecutionSpan, MissingAgentSpanError, SpanKind, SpanRecorder, SpanStatus};
