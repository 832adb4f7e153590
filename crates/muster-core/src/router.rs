//! Complexity classification and model routing.
//!
//! `classify_complexity` buckets a query by keyword sets and word count;
//! `route_query` turns the bucket plus a routing policy into a concrete
//! provider/model decision. Cost, latency, and quality figures come from the
//! static preset catalog, never live measurement, and every decision carries
//! a nonempty reason for telemetry.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use muster_schema::{preset_by_id, ModelRef, ModelRouting, RoutingHints};

use crate::error::{MusterError, Result};
use crate::intent::normalize;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    Strategic,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
            Complexity::Strategic => "strategic",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword sets and the word-count threshold behind classification.
/// Group routing hints extend the keyword sets and override the threshold.
#[derive(Debug, Clone)]
pub struct ClassifierPolicy {
    pub moderate_word_threshold: usize,
    pub strategic_keywords: Vec<String>,
    pub complex_keywords: Vec<String>,
    pub complex_phrases: Vec<String>,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        ClassifierPolicy {
            moderate_word_threshold: 12,
            strategic_keywords: words(&[
                "plan",
                "plans",
                "planning",
                "architecture",
                "architectures",
                "architect",
                "design",
                "designs",
                "designing",
                "strategy",
                "strategic",
                "roadmap",
                "roadmaps",
            ]),
            complex_keywords: words(&[
                "debug",
                "debugging",
                "fix",
                "fixing",
                "bug",
                "bugs",
                "error",
                "errors",
                "analyze",
                "analyzing",
                "analysis",
                "implement",
                "implementing",
                "implementation",
                "optimize",
                "optimizing",
                "optimization",
                "refactor",
                "refactoring",
            ]),
            complex_phrases: words(&["generate code", "write code"]),
        }
    }
}

impl ClassifierPolicy {
    pub fn with_hints(mut self, hints: &RoutingHints) -> Self {
        if let Some(threshold) = hints.moderate_word_threshold {
            self.moderate_word_threshold = threshold;
        }
        self.strategic_keywords
            .extend(hints.strategic_keywords.iter().cloned());
        self.complex_keywords
            .extend(hints.complex_keywords.iter().cloned());
        self
    }
}

/// Classifies with the default policy.
pub fn classify_complexity(text: &str) -> Complexity {
    classify_with(text, &ClassifierPolicy::default())
}

/// Strategic keywords outrank complex ones; both outrank the word-count
/// heuristic. Keywords match whole normalized tokens, phrases match with
/// word boundaries.
pub fn classify_with(text: &str, policy: &ClassifierPolicy) -> Complexity {
    let norm = normalize(text);
    let tokens: HashSet<&str> = norm.split_whitespace().collect();
    if policy
        .strategic_keywords
        .iter()
        .any(|k| tokens.contains(k.as_str()))
    {
        return Complexity::Strategic;
    }
    let padded = format!(" {norm} ");
    if policy
        .complex_keywords
        .iter()
        .any(|k| tokens.contains(k.as_str()))
        || policy
            .complex_phrases
            .iter()
            .any(|p| padded.contains(&format!(" {p} ")))
    {
        return Complexity::Complex;
    }
    if norm.split_whitespace().count() >= policy.moderate_word_threshold {
        return Complexity::Moderate;
    }
    Complexity::Simple
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteStrategy {
    LocalFirst,
    CostOptimized,
    QualityOptimized,
    Fallback,
}

impl RouteStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStrategy::LocalFirst => "local-first",
            RouteStrategy::CostOptimized => "cost-optimized",
            RouteStrategy::QualityOptimized => "quality-optimized",
            RouteStrategy::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RouteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing policy assembled from a model-routing block.
///
/// `local` and `cloud` keep declaration order; that order is also the
/// fallback order. `available` narrows which providers the router may pick;
/// by default every declared provider counts as available.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub local: Vec<ModelRef>,
    pub cloud: Vec<ModelRef>,
    pub available: HashSet<String>,
    pub default_strategy: RouteStrategy,
    pub classifier: ClassifierPolicy,
}

impl RoutingPolicy {
    pub fn from_routing(routing: &ModelRouting) -> Self {
        let local: Vec<ModelRef> = routing
            .local
            .iter()
            .map(|raw| positional_candidate(raw, "ollama"))
            .collect();
        let cloud: Vec<ModelRef> = routing
            .routers
            .iter()
            .map(|raw| positional_candidate(raw, "openrouter"))
            .collect();
        let available = local
            .iter()
            .chain(cloud.iter())
            .map(|m| m.provider.clone())
            .collect();
        RoutingPolicy {
            local,
            cloud,
            available,
            default_strategy: RouteStrategy::LocalFirst,
            classifier: ClassifierPolicy::default(),
        }
    }

    /// Policy for one actor: their own model-routing block, or the
    /// overmind's when theirs declares no candidates, with the group's
    /// routing hints applied.
    pub fn for_actor(registry: &Registry, actor_id: &str) -> Result<RoutingPolicy> {
        let actor = registry
            .actor(actor_id)
            .ok_or_else(|| MusterError::UnknownActor(actor_id.to_string()))?;
        let own = &actor.model_routing;
        let routing = if own.local.is_empty() && own.routers.is_empty() {
            &registry.overmind.model_routing
        } else {
            own
        };
        let mut policy = RoutingPolicy::from_routing(routing);
        if let Some(hints) = registry
            .actor_group(actor_id)
            .and_then(|g| g.routing.as_ref())
        {
            policy = policy.with_hints(hints);
        }
        Ok(policy)
    }

    pub fn with_hints(mut self, hints: &RoutingHints) -> Self {
        self.classifier = self.classifier.with_hints(hints);
        self
    }

    pub fn with_available<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available = providers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default_strategy(mut self, strategy: RouteStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Every candidate in declaration order, locals first, as
    /// `provider/model` strings. This is the fallback-chain order.
    pub fn fallback_models(&self) -> Vec<String> {
        self.local
            .iter()
            .chain(self.cloud.iter())
            .map(ModelRef::qualified)
            .collect()
    }

    fn is_available(&self, provider: &str) -> bool {
        self.available.contains(provider)
    }
}

/// Bare tokens that are not preset ids take the provider implied by the
/// list they appeared in: local entries are models on the local runtime,
/// router entries are models behind the cloud router.
fn positional_candidate(raw: &str, implied_provider: &str) -> ModelRef {
    let candidate = ModelRef::parse(raw);
    if candidate.provider == candidate.model && preset_by_id(&candidate.provider).is_none() {
        ModelRef::new(implied_provider, raw)
    } else {
        candidate
    }
}

/// One routing decision. Estimates come from the preset catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub provider: String,
    pub model: String,
    pub complexity: Complexity,
    pub strategy: RouteStrategy,
    pub estimated_cost_per_1k: f64,
    pub estimated_latency_ms: u64,
    pub reason: String,
}

/// Routes a query under the policy.
///
/// Complex and strategic queries always go to the highest-quality declared
/// provider, whatever strategy was requested. When nothing declared is
/// available the router still answers with the first declared candidate;
/// real failures belong to the fallback executor. Only a policy with zero
/// candidates is an error.
pub fn route_query(
    text: &str,
    policy: &RoutingPolicy,
    strategy: Option<RouteStrategy>,
) -> Result<RoutingDecision> {
    let candidates: Vec<(bool, &ModelRef)> = policy
        .local
        .iter()
        .map(|m| (true, m))
        .chain(policy.cloud.iter().map(|m| (false, m)))
        .collect();
    let Some(&(_, first_declared)) = candidates.first() else {
        return Err(MusterError::EmptyRoutingPolicy);
    };

    let complexity = classify_with(text, &policy.classifier);
    let strategy = strategy.unwrap_or(policy.default_strategy);
    let available: Vec<(bool, &ModelRef)> = candidates
        .iter()
        .copied()
        .filter(|(_, m)| policy.is_available(&m.provider))
        .collect();

    let picked = if complexity >= Complexity::Complex {
        quality_pick(&available).map(|(m, why)| {
            (
                m,
                format!("complexity {complexity} overrides strategy {strategy}: {why}"),
            )
        })
    } else {
        match strategy {
            RouteStrategy::LocalFirst => local_first_pick(&available),
            RouteStrategy::CostOptimized => cost_pick(&available),
            RouteStrategy::QualityOptimized => quality_pick(&available),
            RouteStrategy::Fallback => fallback_pick(&available),
        }
    };
    let (model, reason) = picked.unwrap_or_else(|| {
        (
            first_declared,
            format!(
                "no declared candidate is available; keeping first declared {}",
                first_declared.provider
            ),
        )
    });

    let decision = RoutingDecision {
        provider: model.provider.clone(),
        model: model.model.clone(),
        complexity,
        strategy,
        estimated_cost_per_1k: provider_cost(&model.provider),
        estimated_latency_ms: provider_latency(&model.provider),
        reason,
    };
    tracing::debug!(
        provider = %decision.provider,
        model = %decision.model,
        complexity = %decision.complexity,
        strategy = %decision.strategy,
        "routing decision"
    );
    Ok(decision)
}

fn local_first_pick<'a>(available: &[(bool, &'a ModelRef)]) -> Option<(&'a ModelRef, String)> {
    if let Some(&(_, m)) = available.iter().find(|(is_local, _)| *is_local) {
        return Some((m, format!("local-first: {} is declared available", m.provider)));
    }
    cost_pick(available).map(|(m, why)| (m, format!("local-first: no local candidate available; {why}")))
}

fn cost_pick<'a>(available: &[(bool, &'a ModelRef)]) -> Option<(&'a ModelRef, String)> {
    if let Some(&(_, m)) = available.iter().find(|(is_local, _)| *is_local) {
        return Some((m, format!("cost-optimized: local {} runs free", m.provider)));
    }
    let mut best: Option<(&ModelRef, f64)> = None;
    for &(_, m) in available {
        let cost = provider_cost(&m.provider);
        if best.map_or(true, |(_, best_cost)| cost < best_cost) {
            best = Some((m, cost));
        }
    }
    best.map(|(m, cost)| {
        (
            m,
            format!(
                "cost-optimized: cheapest declared cloud candidate ({} at ${cost}/1k)",
                m.provider
            ),
        )
    })
}

fn quality_pick<'a>(available: &[(bool, &'a ModelRef)]) -> Option<(&'a ModelRef, String)> {
    let mut best: Option<(&ModelRef, u8)> = None;
    for &(_, m) in available {
        let quality = provider_quality(&m.provider);
        if best.map_or(true, |(_, best_quality)| quality > best_quality) {
            best = Some((m, quality));
        }
    }
    best.map(|(m, quality)| {
        (
            m,
            format!(
                "quality-optimized: {} has the highest catalog quality ({quality})",
                m.provider
            ),
        )
    })
}

fn fallback_pick<'a>(available: &[(bool, &'a ModelRef)]) -> Option<(&'a ModelRef, String)> {
    available.first().map(|&(is_local, m)| {
        let kind = if is_local { "local" } else { "cloud default" };
        (
            m,
            format!(
                "fallback: {} is the first declared available candidate ({kind} model {})",
                m.provider, m.model
            ),
        )
    })
}

fn provider_cost(provider: &str) -> f64 {
    preset_by_id(provider).map(|p| p.cost_per_1k_tokens).unwrap_or(0.0)
}

fn provider_quality(provider: &str) -> u8 {
    preset_by_id(provider).map(|p| p.quality).unwrap_or(0)
}

fn provider_latency(provider: &str) -> u64 {
    preset_by_id(provider).map(|p| p.typical_latency_ms).unwrap_or(1000)
}
