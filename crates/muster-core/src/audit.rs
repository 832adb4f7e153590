//! Audit trail for routing decisions and fallback chains.
//!
//! Entries are structured records emitted to a dedicated tracing target so
//! subscribers can ship them to a bus topic without touching operational
//! logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::fallback::{FallbackTrail, ModelAttempt};
use crate::router::{Complexity, RouteStrategy, RoutingDecision};

/// Tracing target carrying every audit entry.
pub const AUDIT_TARGET: &str = "muster::audit";

/// Bus topic used when the roster configures none.
pub const DEFAULT_AUDIT_TOPIC: &str = "router.audit";

const QUERY_SUMMARY_MAX: usize = 120;

/// Audit record for one routing decision.
#[derive(Debug, Clone, Serialize)]
pub struct RouteAuditEntry {
    /// When the decision was made
    pub at: DateTime<Utc>,
    /// Correlates this entry with a fallback trail
    pub trace_id: Uuid,
    /// Bus topic the entry is addressed to
    pub topic: String,
    /// Truncated query text
    pub query_summary: String,
    pub complexity: Complexity,
    pub strategy: RouteStrategy,
    pub provider: String,
    pub model: String,
    /// Human-readable explanation of the pick
    pub reason: String,
}

impl RouteAuditEntry {
    pub fn new(topic: impl Into<String>, query: &str, decision: &RoutingDecision) -> Self {
        RouteAuditEntry {
            at: Utc::now(),
            trace_id: Uuid::new_v4(),
            topic: topic.into(),
            query_summary: truncate(query, QUERY_SUMMARY_MAX),
            complexity: decision.complexity,
            strategy: decision.strategy,
            provider: decision.provider.clone(),
            model: decision.model.clone(),
            reason: decision.reason.clone(),
        }
    }

    /// Reuse a caller-held id so the route entry and any fallback trail
    /// correlate.
    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Emit this entry to the tracing log.
    pub fn emit(&self) {
        tracing::info!(
            target: AUDIT_TARGET,
            topic = %self.topic,
            trace_id = %self.trace_id,
            provider = %self.provider,
            model = %self.model,
            complexity = %self.complexity,
            strategy = %self.strategy,
            reason = %self.reason,
            query = %self.query_summary,
            "route decision"
        );
    }
}

/// Audit record for a fallback chain that made more than one attempt.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackAuditEntry {
    pub at: DateTime<Utc>,
    pub trace_id: Uuid,
    pub topic: String,
    /// Model the chain started from
    pub primary: String,
    pub attempts: Vec<ModelAttempt>,
}

impl FallbackAuditEntry {
    pub fn new(
        topic: impl Into<String>,
        primary: impl Into<String>,
        attempts: Vec<ModelAttempt>,
    ) -> Self {
        FallbackAuditEntry {
            at: Utc::now(),
            trace_id: Uuid::new_v4(),
            topic: topic.into(),
            primary: primary.into(),
            attempts,
        }
    }

    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Emit this entry to the tracing log.
    pub fn emit(&self) {
        let trail = FallbackTrail {
            attempts: self.attempts.clone(),
        };
        let recovered = self.attempts.last().map(|a| a.success).unwrap_or(false);
        tracing::info!(
            target: AUDIT_TARGET,
            topic = %self.topic,
            trace_id = %self.trace_id,
            primary = %self.primary,
            attempts = self.attempts.len(),
            recovered,
            trail = %trail,
            "fallback trail"
        );
    }
}

/// Truncate on a character boundary, adding ellipsis if truncated.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision() -> RoutingDecision {
        RoutingDecision {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-6".to_string(),
            complexity: Complexity::Complex,
            strategy: RouteStrategy::LocalFirst,
            estimated_cost_per_1k: 0.003,
            estimated_latency_ms: 1100,
            reason: "complexity complex overrides strategy local-first".to_string(),
        }
    }

    #[test]
    fn route_entry_serializes() {
        let entry = RouteAuditEntry::new("router.audit", "debug the release build", &decision());
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("anthropic"));
        assert!(json.contains("\"complexity\":\"complex\""));
        assert!(json.contains("\"strategy\":\"local-first\""));
        assert!(json.contains("router.audit"));
    }

    #[test]
    fn query_summary_is_truncated() {
        let long = "word ".repeat(60);
        let entry = RouteAuditEntry::new("router.audit", &long, &decision());
        assert!(entry.query_summary.chars().count() <= 120);
        assert!(entry.query_summary.ends_with("..."));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("hello world", 8), "hello...");
        // multi-byte input must not split a character
        let tidy = truncate(&"ü".repeat(50), 10);
        assert_eq!(tidy.chars().count(), 10);
    }

    #[test]
    fn fallback_entry_keeps_attempt_errors() {
        let entry = FallbackAuditEntry::new(
            "router.audit",
            "ollama/llama3.2",
            vec![
                ModelAttempt {
                    model: "ollama/llama3.2".to_string(),
                    success: false,
                    latency_ms: 40,
                    error: Some("connection refused".to_string()),
                },
                ModelAttempt {
                    model: "anthropic/claude-sonnet-4-6".to_string(),
                    success: true,
                    latency_ms: 900,
                    error: None,
                },
            ],
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("connection refused"));
        assert!(json.contains("anthropic/claude-sonnet-4-6"));
        // successful attempt omits the error field entirely
        assert!(!json.contains("\"error\":null"));
        entry.emit();
    }

    #[test]
    fn trace_id_can_be_pinned() {
        let id = Uuid::new_v4();
        let entry = RouteAuditEntry::new("router.audit", "hi", &decision()).with_trace_id(id);
        assert_eq!(entry.trace_id, id);
    }
}
