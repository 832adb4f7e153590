//! Intent-driven tool selection.
//!
//! Matching runs in two phases over an actor's selection rules. Phase one
//! looks for the normalized trigger as a substring of the normalized intent,
//! in declaration order. Phase two runs only when phase one matched nothing:
//! asymmetric token coverage of the trigger's token set by the intent's,
//! accepted at or above the policy threshold. A rule with a null target is a
//! real match that prefers general reasoning over any tool.

use std::collections::HashSet;

use muster_schema::SelectionRuleDoc;

use crate::error::{MusterError, Result};
use crate::registry::{Actor, Registry, Tool};

/// Tunable matching knobs.
#[derive(Debug, Clone)]
pub struct MatchPolicy {
    /// Minimum phase-two token coverage, in `0.0..=1.0`.
    pub fuzzy_threshold: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy { fuzzy_threshold: 0.6 }
    }
}

/// Outcome of a full dispatch resolution. `tool: None` means general
/// reasoning is the answer; `reason` is always populated.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ToolSelection {
    pub tool: Option<String>,
    pub command: Option<String>,
    pub reason: String,
}

enum MatchBasis {
    Exact,
    Fuzzy(f64),
}

enum MatchOutcome<'a> {
    Tool { rule: &'a SelectionRuleDoc, tool_id: &'a str, basis: MatchBasis },
    PreferReasoning { rule: &'a SelectionRuleDoc },
    NoMatch,
}

/// Resolves intents against a built registry. Cheap to construct per
/// request; holds no state beyond the policy.
pub struct IntentResolver<'r> {
    registry: &'r Registry,
    policy: MatchPolicy,
}

impl<'r> IntentResolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        IntentResolver {
            registry,
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(registry: &'r Registry, policy: MatchPolicy) -> Self {
        IntentResolver { registry, policy }
    }

    /// Best-match tool id for the intent, `None` when no rule matched or the
    /// matching rule prefers reasoning. Does not check ownership; that is
    /// [`IntentResolver::auto_select`]'s job.
    pub fn select_tool(&self, actor_id: &str, intent: &str) -> Result<Option<String>> {
        let actor = self.actor(actor_id)?;
        Ok(match self.resolve(actor, intent) {
            MatchOutcome::Tool { tool_id, .. } => Some(tool_id.to_string()),
            MatchOutcome::PreferReasoning { .. } | MatchOutcome::NoMatch => None,
        })
    }

    /// Every matching tool id in declaration order, de-duplicated, null
    /// targets filtered out.
    pub fn select_tools(&self, actor_id: &str, intent: &str) -> Result<Vec<String>> {
        let actor = self.actor(actor_id)?;
        let rules = self.matching_rules(actor, intent);
        let mut seen = HashSet::new();
        Ok(rules
            .into_iter()
            .filter_map(|(rule, _)| rule.tool.as_deref())
            .filter(|id| seen.insert(id.to_string()))
            .map(str::to_string)
            .collect())
    }

    /// Full dispatch: match, enforce ownership, resolve the command.
    ///
    /// A matched tool the actor does not own is a permission error even when
    /// the actor's group declares it. A matched tool with no resolvable
    /// command (undeclared in the group, or a blank template) comes back as
    /// `{ tool, command: None }` so the caller can surface the inconsistency.
    pub fn auto_select(&self, actor_id: &str, intent: &str) -> Result<ToolSelection> {
        let actor = self.actor(actor_id)?;
        match self.resolve(actor, intent) {
            MatchOutcome::NoMatch => Ok(ToolSelection {
                tool: None,
                command: None,
                reason: "no selection rule matched; deferring to general reasoning".to_string(),
            }),
            MatchOutcome::PreferReasoning { rule } => Ok(ToolSelection {
                tool: None,
                command: None,
                reason: format!("trigger '{}' prefers general reasoning over tools", rule.trigger),
            }),
            MatchOutcome::Tool { rule, tool_id, basis } => {
                let matched = match basis {
                    MatchBasis::Exact => format!("matched trigger '{}' (exact phrase)", rule.trigger),
                    MatchBasis::Fuzzy(score) => {
                        format!("matched trigger '{}' (token coverage {score:.2})", rule.trigger)
                    }
                };
                let Some(tool) = self.registry.tool_in_group(&actor.group_id, tool_id) else {
                    return Ok(ToolSelection {
                        tool: Some(tool_id.to_string()),
                        command: None,
                        reason: format!(
                            "{matched}; tool {tool_id} is not declared in group {}",
                            actor.group_id
                        ),
                    });
                };
                if !actor.owns(tool_id) {
                    return Err(MusterError::PermissionDenied {
                        actor: actor.id.clone(),
                        tool: tool_id.to_string(),
                    });
                }
                tracing::debug!(
                    actor = %actor.id,
                    tool = %tool.id,
                    "intent resolved to tool invocation"
                );
                match tool.runnable_command() {
                    Some(command) => Ok(ToolSelection {
                        tool: Some(tool_id.to_string()),
                        command: Some(command.to_string()),
                        reason: matched,
                    }),
                    None => Ok(ToolSelection {
                        tool: Some(tool_id.to_string()),
                        command: None,
                        reason: format!("{matched}; tool {tool_id} has no runnable command"),
                    }),
                }
            }
        }
    }

    /// Whether the actor's owned set contains the tool. Unknown actors
    /// simply cannot invoke anything.
    pub fn can_invoke(&self, actor_id: &str, tool_id: &str) -> bool {
        self.registry
            .actor(actor_id)
            .map(|a| a.owns(tool_id))
            .unwrap_or(false)
    }

    /// Full tool records for the actor's owned set, declaration order.
    pub fn owned_tools(&self, actor_id: &str) -> Result<Vec<&'r Tool>> {
        let actor = self.actor(actor_id)?;
        Ok(actor
            .tools
            .iter()
            .filter_map(|id| self.registry.tool_in_group(&actor.group_id, id))
            .collect())
    }

    /// Actors across all groups whose owned set contains the tool.
    pub fn owners_of(&self, tool_id: &str) -> Vec<&'r Actor> {
        self.registry.owners_of(tool_id)
    }

    fn actor(&self, actor_id: &str) -> Result<&'r Actor> {
        self.registry
            .actor(actor_id)
            .ok_or_else(|| MusterError::UnknownActor(actor_id.to_string()))
    }

    fn resolve<'a>(&self, actor: &'a Actor, intent: &str) -> MatchOutcome<'a> {
        let rules = self.matching_rules(actor, intent);
        let mut best: Option<(&SelectionRuleDoc, MatchBasis)> = None;
        for (rule, basis) in rules {
            let better = match (&basis, &best) {
                (_, None) => true,
                (MatchBasis::Fuzzy(score), Some((_, MatchBasis::Fuzzy(best_score)))) => {
                    score > best_score
                }
                // exact matches already won in declaration order
                _ => false,
            };
            if better {
                best = Some((rule, basis));
            }
        }
        match best {
            None => MatchOutcome::NoMatch,
            Some((rule, basis)) => match rule.tool.as_deref() {
                Some(tool_id) => MatchOutcome::Tool { rule, tool_id, basis },
                None => MatchOutcome::PreferReasoning { rule },
            },
        }
    }

    /// Matched rules in declaration order with their basis. Phase two runs
    /// only when phase one found nothing at all.
    fn matching_rules<'a>(
        &self,
        actor: &'a Actor,
        intent: &str,
    ) -> Vec<(&'a SelectionRuleDoc, MatchBasis)> {
        let intent_norm = normalize(intent);

        let exact: Vec<_> = actor
            .selection_rules
            .iter()
            .filter(|rule| {
                let trigger = normalize(&rule.trigger);
                !trigger.is_empty() && intent_norm.contains(&trigger)
            })
            .map(|rule| (rule, MatchBasis::Exact))
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        let intent_tokens: HashSet<&str> = intent_norm.split_whitespace().collect();
        actor
            .selection_rules
            .iter()
            .filter_map(|rule| {
                let trigger = normalize(&rule.trigger);
                let trigger_tokens: HashSet<&str> = trigger.split_whitespace().collect();
                if trigger_tokens.is_empty() {
                    return None;
                }
                let overlap = trigger_tokens
                    .iter()
                    .filter(|t| intent_tokens.contains(*t))
                    .count();
                let coverage = overlap as f64 / trigger_tokens.len() as f64;
                (coverage >= self.policy.fuzzy_threshold)
                    .then_some((rule, MatchBasis::Fuzzy(coverage)))
            })
            .collect()
    }
}

/// Lowercases and replaces every non-alphanumeric run with a single space.
pub(crate) fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut gap = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            gap = false;
        } else if !gap {
            out.push(' ');
            gap = true;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_schema::parse_roster;

    fn registry() -> Registry {
        Registry::build(
            parse_roster(
                r#"
overmind:
  name: Hub
groups:
  - id: forge
    name: The Forge
    charter: build and ship
    toolbelt:
      - id: build-bundle
        name: Bundle Builder
        command: cd app && build
        summary: produce the production bundle
        owner: embercode
      - id: deploy-prod
        name: Deployer
        command: deploy --prod
        summary: ship to production
        owner: embercode
      - id: secret-audit
        name: Auditor
        command: audit --all
        summary: inspect everything
        owner: seer
      - id: broken-tool
        name: Broken
        command: "   "
        summary: command template left blank
        owner: embercode
    members:
      - id: embercode
        title: Build Smith
        responsibilities: [builds]
        tools: [build-bundle, deploy-prod, broken-tool]
        selection_rules:
          - trigger: build production bundle
            tool: build-bundle
          - trigger: ship the release
            tool: deploy-prod
          - trigger: write a poem
            tool: null
          - trigger: audit everything
            tool: secret-audit
          - trigger: summon the phantom
            tool: phantom-tool
          - trigger: run the broken thing
            tool: broken-tool
      - id: seer
        title: Analyst
        responsibilities: [reads]
        tools: [secret-audit]
"#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn exact_phrase_selects_the_first_declared_rule() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        let tool = resolver
            .select_tool("embercode", "please Build Production Bundle for tomorrow")
            .unwrap();
        assert_eq!(tool.as_deref(), Some("build-bundle"));
    }

    #[test]
    fn normalization_ignores_punctuation_and_case() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        let tool = resolver
            .select_tool("embercode", "SHIP, the — release!!")
            .unwrap();
        assert_eq!(tool.as_deref(), Some("deploy-prod"));
    }

    #[test]
    fn exact_match_beats_any_fuzzy_candidate() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        // "ship the release" is contained verbatim; "build production bundle"
        // would also clear the fuzzy bar on tokens, but phase two never runs.
        let tool = resolver
            .select_tool("embercode", "ship the release with the production bundle build")
            .unwrap();
        assert_eq!(tool.as_deref(), Some("deploy-prod"));
    }

    #[test]
    fn fuzzy_coverage_meets_threshold() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        // tokens {build, production, bundle}: two of three present = 0.67
        let tool = resolver
            .select_tool("embercode", "bundle the production artifacts")
            .unwrap();
        assert_eq!(tool.as_deref(), Some("build-bundle"));
    }

    #[test]
    fn weak_fuzzy_coverage_is_no_match() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        // only {production} overlaps = 0.33
        let tool = resolver
            .select_tool("embercode", "what does production mean")
            .unwrap();
        assert_eq!(tool, None);
    }

    #[test]
    fn fuzzy_threshold_is_policy() {
        let registry = registry();
        let strict = IntentResolver::with_policy(&registry, MatchPolicy { fuzzy_threshold: 0.9 });
        let tool = strict
            .select_tool("embercode", "bundle the production artifacts")
            .unwrap();
        assert_eq!(tool, None, "0.67 coverage must fail a 0.9 threshold");
    }

    #[test]
    fn null_target_rule_prefers_reasoning() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        assert_eq!(resolver.select_tool("embercode", "write a poem").unwrap(), None);
        let selection = resolver.auto_select("embercode", "write a poem").unwrap();
        assert_eq!(selection.tool, None);
        assert_eq!(selection.command, None);
        assert!(!selection.reason.is_empty());
    }

    #[test]
    fn select_tools_orders_and_dedups() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        let tools = resolver
            .select_tools("embercode", "build production bundle then ship the release and write a poem")
            .unwrap();
        assert_eq!(tools, vec!["build-bundle".to_string(), "deploy-prod".to_string()]);
    }

    #[test]
    fn auto_select_returns_the_command() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        let selection = resolver.auto_select("embercode", "build production bundle").unwrap();
        assert_eq!(selection.tool.as_deref(), Some("build-bundle"));
        assert_eq!(selection.command.as_deref(), Some("cd app && build"));
        assert!(!selection.reason.is_empty());
    }

    #[test]
    fn group_tool_not_owned_is_a_permission_error() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        let err = resolver.auto_select("embercode", "audit everything").unwrap_err();
        match err {
            MusterError::PermissionDenied { actor, tool } => {
                assert_eq!(actor, "embercode");
                assert_eq!(tool, "secret-audit");
            }
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
    }

    #[test]
    fn undeclared_target_is_a_result_value_not_an_error() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        let selection = resolver.auto_select("embercode", "summon the phantom").unwrap();
        assert_eq!(selection.tool.as_deref(), Some("phantom-tool"));
        assert_eq!(selection.command, None);
        assert!(selection.reason.contains("not declared"), "{}", selection.reason);
    }

    #[test]
    fn blank_command_template_is_a_result_value() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        let selection = resolver.auto_select("embercode", "run the broken thing").unwrap();
        assert_eq!(selection.tool.as_deref(), Some("broken-tool"));
        assert_eq!(selection.command, None);
        assert!(selection.reason.contains("no runnable command"), "{}", selection.reason);
    }

    #[test]
    fn unknown_actor_is_an_error() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        assert!(matches!(
            resolver.select_tool("nobody", "anything"),
            Err(MusterError::UnknownActor(ref id)) if id == "nobody"
        ));
    }

    #[test]
    fn ownership_queries() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        assert!(resolver.can_invoke("embercode", "build-bundle"));
        assert!(!resolver.can_invoke("embercode", "secret-audit"));
        assert!(!resolver.can_invoke("nobody", "build-bundle"));
        // a tool id absent from the whole roster is a plain refusal
        assert!(!resolver.can_invoke("embercode", "no-such-tool"));
        assert!(resolver.owners_of("no-such-tool").is_empty());
        let owned = resolver.owned_tools("embercode").unwrap();
        let ids: Vec<_> = owned.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["build-bundle", "deploy-prod", "broken-tool"]);
        let owners = resolver.owners_of("secret-audit");
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].id, "seer");
    }

    #[test]
    fn selection_is_deterministic() {
        let registry = registry();
        let resolver = IntentResolver::new(&registry);
        let a = resolver.auto_select("embercode", "bundle the production artifacts").unwrap();
        let b = resolver.auto_select("embercode", "bundle the production artifacts").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_lowercases_and_strips_punctuation() {
        assert_eq!(normalize("  Build — Production   BUNDLE!"), "build production bundle");
        assert_eq!(normalize("???"), "");
        assert_eq!(normalize("a-b_c"), "a b c");
    }
}
