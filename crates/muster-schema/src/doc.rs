//! Wire-shape types for the roster document.
//!
//! These mirror the YAML layout after the migration pipeline has run: legacy
//! key spellings folded away, ids synthesized, tool ownership flattened.
//! Invariants that span the document (ownership closure, duplicate ids) are
//! not enforced here; the registry builder does that in a second pass.

use serde::{Deserialize, Serialize};

/// Top-level roster document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterDoc {
    pub overmind: OvermindDoc,
    #[serde(default)]
    pub groups: Vec<GroupDoc>,
}

/// Global coordinator identity and workspace-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvermindDoc {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub model_routing: ModelRouting,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub pr_gates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "default_router_audit_topic")]
    pub router_audit_topic: String,
    #[serde(default)]
    pub policy_gates: Vec<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        TelemetrySettings {
            router_audit_topic: default_router_audit_topic(),
            policy_gates: Vec::new(),
        }
    }
}

fn default_router_audit_topic() -> String {
    "router.audit".to_string()
}

/// Model-routing block shared by the overmind and individual members.
///
/// `local` and `routers` are ordered candidate lists; order is the fallback
/// order. Accepted under the legacy key `brain` as well (folded by
/// migration).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRouting {
    #[serde(default)]
    pub local: Vec<String>,
    #[serde(default)]
    pub routers: Vec<String>,
    /// Embedding model candidates. A scalar in the document is normalized
    /// to a one-element list by migration.
    #[serde(default)]
    pub embeddings: Vec<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDoc {
    /// Synthesized from `name` by migration when absent.
    pub id: String,
    pub name: String,
    pub charter: String,
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default)]
    pub routing: Option<RoutingHints>,
    #[serde(default)]
    pub toolbelt: Vec<ToolDoc>,
    #[serde(default)]
    pub members: Vec<MemberDoc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Terse,
    #[default]
    Normal,
    Verbose,
}

/// Per-group overrides for the complexity classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingHints {
    #[serde(default)]
    pub moderate_word_threshold: Option<usize>,
    #[serde(default)]
    pub strategic_keywords: Vec<String>,
    #[serde(default)]
    pub complex_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDoc {
    pub id: String,
    pub name: String,
    /// Runnable command template. May legitimately be empty in a roster
    /// under repair; dispatch surfaces that as a missing command, not an
    /// error.
    pub command: String,
    pub summary: String,
    /// Member id within the same group.
    pub owner: String,
    #[serde(default)]
    pub docs: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub args: Vec<ToolArgDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolArgDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArgKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Closed value set; required when `kind` is `enum`.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    String,
    Number,
    Boolean,
    Enum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDoc {
    /// Synthesized from `name` (or `title`) by migration when absent.
    pub id: String,
    /// Defaulted from `title` by migration when absent.
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub model_routing: ModelRouting,
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub kpis: Vec<String>,
    /// Owned tool ids, flat. The legacy object form
    /// `{ owned: [...], selection_rules: [...] }` is flattened by migration.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub selection_rules: Vec<SelectionRuleDoc>,
}

/// Maps an intent trigger phrase to a tool id. A null `tool` means the
/// trigger is recognized but general reasoning is preferred over any tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRuleDoc {
    pub trigger: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}
