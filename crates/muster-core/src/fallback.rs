//! Sequential fallback execution over an ordered model chain.
//!
//! The executor tries `[primary, ...fallbacks]` strictly in order, once per
//! model. There are no intra-model retries and no built-in timeout; a caller
//! with a deadline wraps the returned future. Terminal states are success on
//! some candidate or exhaustion of the whole chain.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Instant;

use serde::Serialize;

use crate::audit::{FallbackAuditEntry, DEFAULT_AUDIT_TOPIC};
use crate::error::{MusterError, Result};
use crate::router::RoutingPolicy;

/// Record of one model invocation inside a fallback chain.
#[derive(Debug, Clone, Serialize)]
pub struct ModelAttempt {
    pub model: String,
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The full attempt trail, as carried by the exhaustion error.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackTrail {
    pub attempts: Vec<ModelAttempt>,
}

impl fmt::Display for FallbackTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attempt) in self.attempts.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            match &attempt.error {
                Some(error) => write!(f, "{}: {error}", attempt.model)?,
                None => write!(f, "{}: ok", attempt.model)?,
            }
        }
        Ok(())
    }
}

/// A successful chain run: the value, which model produced it, and every
/// attempt made along the way.
#[derive(Debug, Clone)]
pub struct FallbackOutcome<T> {
    pub value: T,
    pub model: String,
    pub attempts: Vec<ModelAttempt>,
}

impl<T> FallbackOutcome<T> {
    /// True when the primary model did not answer.
    pub fn fell_back(&self) -> bool {
        self.attempts.len() > 1
    }
}

/// Runs opaque async operations under a fallback chain.
pub struct FallbackExecutor {
    fallbacks: Vec<String>,
    audit_topic: Option<String>,
}

impl FallbackExecutor {
    pub fn new<I, S>(fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FallbackExecutor {
            fallbacks: fallbacks.into_iter().map(Into::into).collect(),
            audit_topic: None,
        }
    }

    /// Chain taken from a routing policy's declaration order.
    pub fn from_policy(policy: &RoutingPolicy) -> Self {
        FallbackExecutor::new(policy.fallback_models())
    }

    pub fn with_audit_topic(mut self, topic: impl Into<String>) -> Self {
        self.audit_topic = Some(topic.into());
        self
    }

    /// Tries the operation against `[primary, ...fallbacks]`, de-duplicated
    /// preserving order, until one candidate succeeds.
    ///
    /// The attempt trail is emitted to the audit target only when more than
    /// one attempt occurred. On exhaustion the returned error enumerates
    /// every model tried and its failure.
    pub async fn execute<T, E, F, Fut>(&self, primary: &str, mut op: F) -> Result<FallbackOutcome<T>>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        let mut candidates: Vec<String> = std::iter::once(primary.to_string())
            .chain(self.fallbacks.iter().cloned())
            .collect();
        let mut seen = HashSet::new();
        candidates.retain(|model| seen.insert(model.clone()));

        let mut attempts: Vec<ModelAttempt> = Vec::new();
        for (idx, model) in candidates.iter().enumerate() {
            let started = Instant::now();
            match op(model.clone()).await {
                Ok(value) => {
                    attempts.push(ModelAttempt {
                        model: model.clone(),
                        success: true,
                        latency_ms: started.elapsed().as_millis() as u64,
                        error: None,
                    });
                    if idx > 0 {
                        tracing::info!(
                            model = %model,
                            attempts = attempts.len(),
                            fallback_triggered = true,
                            "model succeeded after fallback"
                        );
                    }
                    self.emit_trail(primary, &attempts);
                    return Ok(FallbackOutcome {
                        value,
                        model: model.clone(),
                        attempts,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        model = %model,
                        error = %error,
                        "model attempt failed; trying next candidate"
                    );
                    attempts.push(ModelAttempt {
                        model: model.clone(),
                        success: false,
                        latency_ms: started.elapsed().as_millis() as u64,
                        error: Some(error.to_string()),
                    });
                }
            }
        }
        self.emit_trail(primary, &attempts);
        Err(MusterError::FallbackExhausted {
            trail: FallbackTrail { attempts },
        })
    }

    fn emit_trail(&self, primary: &str, attempts: &[ModelAttempt]) {
        if attempts.len() <= 1 {
            return;
        }
        let topic = self
            .audit_topic
            .clone()
            .unwrap_or_else(|| DEFAULT_AUDIT_TOPIC.to_string());
        FallbackAuditEntry::new(topic, primary, attempts.to_vec()).emit();
    }
}
