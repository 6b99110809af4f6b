//! Agent entry points (spec.md §1, §4.10): the Policy Enforcement,
//! Constraint Solver, and Approval Routing agents, each a pure async
//! function over an [`environment::AgentEnvironment`] and an
//! [`context::ExecutionContext`], producing a fingerprinted
//! [`warden_decision::DecisionEvent`] alongside its domain-specific
//! result.
//!
//! This crate holds no RPC surface of its own; wiring it behind HTTP,
//! gRPC, or a CLI is left to the binary crate that embeds it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod storage;
pub mod testing;

/// The three agent entry points.
pub mod agents {
    pub mod approval_routing;
    pub mod constraint_solver;
    pub mod policy_enforcement;
}

pub use config::{EngineConfig, Environment};
pub use context::ExecutionContext;
pub use environment::AgentEnvironment;
pub use error::{ExecutionContextError, ExecutionError, GovernanceError, StructuralError};
