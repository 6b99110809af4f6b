//! Execution span tree (spec.md §4.8 "Span tree").
//!
//! Spans form a causal tree: an external caller supplies a
//! `parent_span_id`; the core opens a *repo span* under it, and each
//! agent invocation opens an *agent span* under the repo span. Spans are
//! finalized in reverse order on exit, and every repo span must have
//! finalized at least one agent span or the invariant check fails.

use serde::{Deserialize, Serialize};

/// Kind of span (spec.md §3 `ExecutionSpan.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Wraps one or more agent spans for a single repo-level call.
    Repo,
    /// Wraps a single agent invocation.
    Agent,
}

/// Lifecycle status of a span (spec.md §3 "status transitions:
/// running→{completed, failed}").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    /// Open, not yet finalized.
    Running,
    /// Finalized without error.
    Completed,
    /// Finalized with an error.
    Failed,
}

/// An artifact produced during a span's life (spec.md §3 `Artifact`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique id.
    pub id: String,
    /// Artifact kind, free-form (e.g. `"decision_event"`, `"log"`).
    pub r#type: String,
    /// Opaque reference: id, URI, or hash.
    pub reference: String,
    /// Span that produced it.
    pub producer_span_id: String,
}

/// One node in the span tree (spec.md §3 `ExecutionSpan`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSpan {
    /// Repo or agent.
    pub kind: SpanKind,
    /// Unique id.
    pub span_id: String,
    /// Parent span id — an external id for a repo span, the owning repo
    /// span's id for an agent span.
    pub parent_span_id: String,
    /// Repo this span belongs to.
    pub repo_name: String,
    /// Required when `kind == Agent`.
    pub agent_name: Option<String>,
    /// Lifecycle status.
    pub status: SpanStatus,
    /// Millis since epoch.
    pub start_time: u64,
    /// Millis since epoch; set when finalized.
    pub end_time: Option<u64>,
    /// Artifacts attached during this span's life.
    pub artifacts: Vec<Artifact>,
    /// Error message, set iff `status == Failed`.
    pub error: Option<String>,
}

/// Raised when a repo span is finalized without ever finalizing an agent
/// span beneath it (spec.md §4.8 "Span tree" invariant).
#[derive(Debug, Clone, thiserror::Error)]
#[error("repo span {repo_span_id} finalized with no completed agent span beneath it")]
pub struct MissingAgentSpanError {
    /// The offending repo span.
    pub repo_span_id: String,
}

/// Builds and finalizes a single repo span and its agent spans, enforcing
/// the span-tree invariant. Not `Send`/shared: callers construct one per
/// evaluation and hand it to a single execution context.
#[derive(Debug, Default)]
pub struct SpanRecorder {
    spans: Vec<ExecutionSpan>,
}

impl SpanRecorder {
    /// Construct an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a repo span under `external_parent_span_id`.
    pub fn start_repo_span(
        &mut self,
        span_id: impl Into<String>,
        external_parent_span_id: impl Into<String>,
        repo_name: impl Into<String>,
        start_time: u64,
    ) -> String {
        let span_id = span_id.into();
        self.spans.push(ExecutionSpan {
            kind: SpanKind::Repo,
            span_id: span_id.clone(),
            parent_span_id: external_parent_span_id.into(),
            repo_name: repo_name.into(),
            agent_name: None,
            status: SpanStatus::Running,
            start_time,
            end_time: None,
            artifacts: Vec::new(),
            error: None,
        });
        span_id
    }

    /// Open an agent span under `repo_span_id`.
    pub fn start_agent_span(
        &mut self,
        span_id: impl Into<String>,
        repo_span_id: impl Into<String>,
        repo_name: impl Into<String>,
        agent_name: impl Into<String>,
        start_time: u64,
    ) -> String {
        let span_id = span_id.into();
        self.spans.push(ExecutionSpan {
            kind: SpanKind::Agent,
            span_id: span_id.clone(),
            parent_span_id: repo_span_id.into(),
            repo_name: repo_name.into(),
            agent_name: Some(agent_name.into()),
            status: SpanStatus::Running,
            start_time,
            end_time: None,
            artifacts: Vec::new(),
            error: None,
        });
        span_id
    }

    /// Attach an artifact to `span_id`. No-op if the span is unknown.
    pub fn attach_artifact(&mut self, span_id: &str, artifact: Artifact) {
        if let Some(span) = self.spans.iter_mut().find(|s| s.span_id == span_id) {
            span.artifacts.push(artifact);
        }
    }

    /// Finalize `span_id` as completed or failed. No-op if unknown or
    /// already finalized.
    pub fn finish(&mut self, span_id: &str, end_time: u64, error: Option<String>) {
        if let Some(span) = self.spans.iter_mut().find(|s| s.span_id == span_id) {
            if span.status != SpanStatus::Running {
                return;
            }
            span.end_time = Some(end_time);
            span.status = if error.is_some() { SpanStatus::Failed } else { SpanStatus::Completed };
            span.error = error;
        }
    }

    /// Verify the span-tree invariant for `repo_span_id` — at least one
    /// agent span beneath it must have left `Running` — and return the
    /// full span set if it holds.
    pub fn finalize_repo(
        &self,
        repo_span_id: &str,
    ) -> Result<Vec<ExecutionSpan>, MissingAgentSpanError> {
        let has_finalized_agent = self.spans.iter().any(|s| {
            s.kind == SpanKind::Agent
                && s.parent_span_id == repo_span_id
                && s.status != SpanStatus::Running
        });
        if !has_finalized_agent {
            return Err(MissingAgentSpanError { repo_span_id: repo_span_id.to_string() });
        }
        Ok(self.spans.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_span_without_agent_span_is_rejected() {
        let mut rec = SpanRecorder::new();
        let repo = rec.start_repo_span("s1", "ext-1", "policy-enforcement", 0);
        rec.finish(&repo, 10, None);
        assert!(rec.finalize_repo(&repo).is_err());
    }

    #[test]
    fn repo_span_with_completed_agent_span_is_accepted() {
        let mut rec = SpanRecorder::new();
        let repo = rec.start_repo_span("s1", "ext-1", "policy-enforcement", 0);
        let agent = rec.start_agent_span("s2", &repo, "policy-enforcement", "policy-enforcement-agent", 1);
        rec.finish(&agent, 5, None);
        rec.finish(&repo, 10, None);
        let spans = rec.finalize_repo(&repo).unwrap();
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn failed_agent_span_still_satisfies_invariant() {
        let mut rec = SpanRecorder::new();
        let repo = rec.start_repo_span("s1", "ext-1", "constraint-solver", 0);
        let agent = rec.start_agent_span("s2", &repo, "constraint-solver", "constraint-solver-agent", 1);
        rec.finish(&agent, 5, Some("boom".to_string()));
        assert!(rec.finalize_repo(&repo).is_ok());
    }

    #[test]
    fn artifact_attaches_to_its_producer_span() {
        let mut rec = SpanRecorder::new();
        let repo = rec.start_repo_span("s1", "ext-1", "approval-router", 0);
        let agent = rec.start_agent_span("s2", &repo, "approval-router", "approval-router-agent", 1);
        rec.attach_artifact(
            &agent,
            Artifact {
                id: "a1".into(),
                r#type: "decision_event".into(),
                reference: "evt-1".into(),
                producer_span_id: agent.clone(),
            },
        );
        rec.finish(&agent, 5, None);
        let spans = rec.finalize_repo(&repo).unwrap();
        let agent_span = spans.iter().find(|s| s.span_id == agent).unwrap();
        assert_eq!(agent_span.artifacts.len(), 1);
    }
}
