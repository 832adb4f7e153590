//! Pass-one structural validation over the typed roster document.
//!
//! Checks shapes a single node can answer for itself. Cross-reference rules
//! (duplicate ids, ownership closure) need the whole document and belong to
//! the registry builder.

use crate::doc::{ArgKind, RosterDoc};
use crate::error::SchemaError;

/// Validates document structure, failing on the first violation with a
/// message naming the offending group, member, or tool.
pub fn validate_structure(doc: &RosterDoc) -> Result<(), SchemaError> {
    if doc.overmind.name.trim().is_empty() {
        return Err(SchemaError::structural("overmind name is empty"));
    }
    for group in &doc.groups {
        if group.id.trim().is_empty() {
            return Err(SchemaError::structural(format!(
                "group '{}' has an empty id",
                group.name
            )));
        }
        if group.members.is_empty() {
            return Err(SchemaError::structural(format!(
                "group has no members: {}",
                group.id
            )));
        }
        for tool in &group.toolbelt {
            if tool.id.trim().is_empty() {
                return Err(SchemaError::structural(format!(
                    "tool with empty id in group: {}",
                    group.id
                )));
            }
            for arg in &tool.args {
                if arg.kind == ArgKind::Enum && arg.options.is_empty() {
                    return Err(SchemaError::structural(format!(
                        "enum arg without options: {} (tool {})",
                        arg.name, tool.id
                    )));
                }
            }
        }
        for member in &group.members {
            if member.id.trim().is_empty() {
                return Err(SchemaError::structural(format!(
                    "member with empty id in group: {}",
                    group.id
                )));
            }
            for rule in &member.selection_rules {
                if rule.trigger.trim().is_empty() {
                    return Err(SchemaError::structural(format!(
                        "empty selection trigger on member: {}",
                        member.id
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_roster;

    #[test]
    fn empty_member_list_is_rejected() {
        let err = parse_roster(
            r#"
overmind:
  name: hub
groups:
  - id: forge
    name: Forge
    charter: build things
    members: []
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("group has no members: forge"), "{err}");
    }

    #[test]
    fn enum_arg_requires_options() {
        let err = parse_roster(
            r#"
overmind:
  name: hub
groups:
  - id: forge
    name: Forge
    charter: build things
    toolbelt:
      - id: deploy
        name: Deploy
        command: deploy.sh
        summary: ship it
        owner: smith
        args:
          - name: env
            type: enum
    members:
      - id: smith
        title: Smith
        responsibilities: [builds]
"#,
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("enum arg without options: env (tool deploy)"),
            "{err}"
        );
    }

    #[test]
    fn empty_trigger_is_rejected() {
        let err = parse_roster(
            r#"
overmind:
  name: hub
groups:
  - id: forge
    name: Forge
    charter: build things
    members:
      - id: smith
        title: Smith
        responsibilities: [builds]
        selection_rules:
          - trigger: "  "
            tool: null
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("empty selection trigger on member: smith"), "{err}");
    }
}
