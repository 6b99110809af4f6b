//! Execution context extraction from inbound headers (spec.md §6
//! "Headers required on externally-invoked POST endpoints").

use crate::error::ExecutionContextError;
use warden_core::facade::IdSource;

/// The three execution-identity headers every externally-invoked call
/// must carry (spec.md §6).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// `x-execution-id`: unique id for the umbrella execution.
    pub execution_id: String,
    /// `x-parent-span-id`: parent span id from the orchestrator.
    pub parent_span_id: String,
    /// `x-correlation-id`: request tracing id, generated if absent.
    pub correlation_id: String,
}

impl ExecutionContext {
    /// Build a context from header values, rejecting a missing
    /// `execution_id` or `parent_span_id` (spec.md §7
    /// `ExecutionContextError`), and generating a `correlation_id` via
    /// `ids` when the caller did not supply one.
    pub fn from_headers(
        execution_id: Option<&str>,
        parent_span_id: Option<&str>,
        correlation_id: Option<&str>,
        ids: &dyn IdSource,
    ) -> Result<Self, ExecutionContextError> {
        let execution_id =
            execution_id.filter(|s| !s.is_empty()).ok_or(ExecutionContextError::MissingExecutionId)?;
        let parent_span_id = parent_span_id
            .filter(|s| !s.is_empty())
            .ok_or(ExecutionContextError::MissingParentSpanId)?;
        let correlation_id = correlation_id
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| ids.new_id());
        Ok(Self {
            execution_id: execution_id.to_string(),
            parent_span_id: parent_span_id.to_string(),
            correlation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::facade::UuidSource;

    #[test]
    fn missing_execution_id_is_rejected() {
        let err = ExecutionContext::from_headers(None, Some("p1"), None, &UuidSource).unwrap_err();
        assert!(matches!(err, ExecutionContextError::MissingExecutionId));
    }

    #[test]
    fn missing_parent_span_id_is_rejected() {
        let err = ExecutionContext::from_headers(Some("e1"), None, None, &UuidSource).unwrap_err();
        assert!(matches!(err, ExecutionContextError::MissingParentSpanId));
    }

    #[test]
    fn absent_correlation_id_is_generated() {
        let ctx = ExecutionContext::from_headers(Some("e1"), Some("p1"), None, &UuidSource).unwrap();
        assert!(!ctx.correlation_id.is_empty());
    }

    #[test]
    fn supplied_correlation_id_is_kept() {
        let ctx =
            ExecutionContext::from_headers(Some("e1"), Some("p1"), Some("corr-1"), &UuidSource).unwrap();
        assert_eq!(ctx.correlation_id, "corr-1");
    }
}
