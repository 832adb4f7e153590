use serde::Serialize;

/// Where a provider runs. Local providers are free and key-less.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Cloud,
}

/// Static metadata for a known model provider.
///
/// Cost, latency, and quality are catalog estimates used by the router to
/// compare candidates; nothing here is measured live.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: ProviderKind,
    pub default_model: &'static str,
    /// Blended USD per 1k tokens. Zero for local providers.
    pub cost_per_1k_tokens: f64,
    pub typical_latency_ms: u64,
    /// Coarse 1-10 capability score for quality-optimized routing.
    pub quality: u8,
}

pub const PROVIDER_PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        id: "ollama",
        name: "Ollama (local)",
        kind: ProviderKind::Local,
        default_model: "llama3.2",
        cost_per_1k_tokens: 0.0,
        typical_latency_ms: 250,
        quality: 4,
    },
    ProviderPreset {
        id: "anthropic",
        name: "Anthropic",
        kind: ProviderKind::Cloud,
        default_model: "claude-sonnet-4-6",
        cost_per_1k_tokens: 0.003,
        typical_latency_ms: 1100,
        quality: 9,
    },
    ProviderPreset {
        id: "openai",
        name: "OpenAI",
        kind: ProviderKind::Cloud,
        default_model: "gpt-5.2",
        cost_per_1k_tokens: 0.01,
        typical_latency_ms: 900,
        quality: 8,
    },
    ProviderPreset {
        id: "gemini",
        name: "Google Gemini",
        kind: ProviderKind::Cloud,
        default_model: "gemini-2.5-pro",
        cost_per_1k_tokens: 0.00125,
        typical_latency_ms: 700,
        quality: 7,
    },
    ProviderPreset {
        id: "groq",
        name: "Groq",
        kind: ProviderKind::Cloud,
        default_model: "llama-3.3-70b-versatile",
        cost_per_1k_tokens: 0.0005,
        typical_latency_ms: 300,
        quality: 5,
    },
    ProviderPreset {
        id: "openrouter",
        name: "OpenRouter",
        kind: ProviderKind::Cloud,
        default_model: "anthropic/claude-sonnet-4-6",
        cost_per_1k_tokens: 0.002,
        typical_latency_ms: 1300,
        quality: 6,
    },
];

/// Look up a provider preset by id.
pub fn preset_by_id(id: &str) -> Option<&'static ProviderPreset> {
    PROVIDER_PRESETS.iter().find(|p| p.id == id)
}

/// A `provider/model` pair resolved from a routing-candidate string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        ModelRef {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Parses a routing candidate.
    ///
    /// `"provider/model"` splits on the first slash. A bare token matching a
    /// preset id resolves to that provider's default model. Any other bare
    /// token is returned with itself as the model; the routing policy decides
    /// which provider it belongs to from the list it appeared in.
    pub fn parse(raw: &str) -> ModelRef {
        if let Some((provider, model)) = raw.split_once('/') {
            if !provider.is_empty() && !model.is_empty() {
                return ModelRef::new(provider, model);
            }
        }
        match preset_by_id(raw) {
            Some(preset) => ModelRef::new(raw, preset.default_model),
            None => ModelRef::new(raw, raw),
        }
    }

    /// `provider/model` display form.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_providers_are_free() {
        for preset in PROVIDER_PRESETS {
            match preset.kind {
                ProviderKind::Local => assert_eq!(preset.cost_per_1k_tokens, 0.0, "{}", preset.id),
                ProviderKind::Cloud => assert!(preset.cost_per_1k_tokens > 0.0, "{}", preset.id),
            }
        }
    }

    #[test]
    fn preset_lookup() {
        assert_eq!(preset_by_id("ollama").unwrap().kind, ProviderKind::Local);
        assert!(preset_by_id("nonexistent").is_none());
    }

    #[test]
    fn model_ref_parses_qualified_and_bare_forms() {
        let qualified = ModelRef::parse("anthropic/claude-sonnet-4-6");
        assert_eq!(qualified.provider, "anthropic");
        assert_eq!(qualified.model, "claude-sonnet-4-6");

        let bare_provider = ModelRef::parse("gemini");
        assert_eq!(bare_provider.provider, "gemini");
        assert_eq!(bare_provider.model, "gemini-2.5-pro");

        let bare_unknown = ModelRef::parse("qwen2.5-coder");
        assert_eq!(bare_unknown.provider, "qwen2.5-coder");
        assert_eq!(bare_unknown.model, "qwen2.5-coder");
    }
}
