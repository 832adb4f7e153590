//! The built roster registry.
//!
//! `Registry::build` runs the cross-reference pass over a parsed document:
//! per-group duplicate rejection, owner resolution, declared-tool resolution,
//! then ownership reconciliation. The result is immutable; share it behind an
//! `Arc` and rebuild to change it.

use std::collections::{HashMap, HashSet};

use muster_schema::{
    GroupDoc, MemberDoc, ModelRouting, OvermindDoc, RosterDoc, RoutingHints, SelectionRuleDoc,
    ToolArgDoc, ToolDoc, Verbosity,
};

use crate::error::{MusterError, Result};

/// A tool with its group context attached.
#[derive(Debug, Clone)]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub command: String,
    pub summary: String,
    pub owner: String,
    pub docs: Option<String>,
    pub tags: Vec<String>,
    pub args: Vec<ToolArgDoc>,
    pub group_id: String,
}

impl Tool {
    /// The runnable command template, `None` when the document left it
    /// blank. A blank command is a data-consistency smell, not an error.
    pub fn runnable_command(&self) -> Option<&str> {
        let trimmed = self.command.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// A member with ownership reconciled and group context attached.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub title: String,
    pub model_routing: ModelRouting,
    pub responsibilities: Vec<String>,
    pub kpis: Vec<String>,
    /// Owned tool ids: the declared list plus any group tool naming this
    /// actor as owner, appended in toolbelt order.
    pub tools: Vec<String>,
    pub selection_rules: Vec<SelectionRuleDoc>,
    pub group_id: String,
}

impl Actor {
    pub fn owns(&self, tool_id: &str) -> bool {
        self.tools.iter().any(|t| t == tool_id)
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub charter: String,
    pub verbosity: Verbosity,
    pub routing: Option<RoutingHints>,
    pub toolbelt: Vec<Tool>,
    pub members: Vec<Actor>,
}

impl Group {
    pub fn tool(&self, tool_id: &str) -> Option<&Tool> {
        self.toolbelt.iter().find(|t| t.id == tool_id)
    }

    pub fn member(&self, actor_id: &str) -> Option<&Actor> {
        self.members.iter().find(|m| m.id == actor_id)
    }
}

/// Immutable registry built from a roster document.
///
/// Group-scoped lookups are the primary path; the global indices are
/// advisory and keep the first declaration when ids collide across groups.
#[derive(Debug)]
pub struct Registry {
    pub overmind: OvermindDoc,
    groups: Vec<Group>,
    group_index: HashMap<String, usize>,
    actor_index: HashMap<String, (usize, usize)>,
    tool_index: HashMap<String, (usize, usize)>,
}

impl Registry {
    /// Cross-reference pass over a structurally valid document.
    pub fn build(doc: RosterDoc) -> Result<Registry> {
        let RosterDoc { overmind, groups } = doc;
        let groups = groups
            .into_iter()
            .map(build_group)
            .collect::<Result<Vec<_>>>()?;

        let mut group_index = HashMap::with_capacity(groups.len());
        let mut actor_index: HashMap<String, (usize, usize)> = HashMap::new();
        let mut tool_index: HashMap<String, (usize, usize)> = HashMap::new();
        for (gi, group) in groups.iter().enumerate() {
            if group_index.contains_key(&group.id) {
                tracing::warn!(group = %group.id, "duplicate group id in roster; first declaration kept");
            } else {
                group_index.insert(group.id.clone(), gi);
            }
            for (mi, member) in group.members.iter().enumerate() {
                if let Some(&(fgi, _)) = actor_index.get(&member.id) {
                    tracing::warn!(
                        actor = %member.id,
                        kept_group = %groups[fgi].id,
                        shadowed_group = %group.id,
                        "duplicate actor id across groups; first declaration kept"
                    );
                } else {
                    actor_index.insert(member.id.clone(), (gi, mi));
                }
            }
            for (ti, tool) in group.toolbelt.iter().enumerate() {
                if let Some(&(fgi, _)) = tool_index.get(&tool.id) {
                    tracing::warn!(
                        tool = %tool.id,
                        kept_group = %groups[fgi].id,
                        shadowed_group = %group.id,
                        "duplicate tool id across groups; first declaration kept"
                    );
                } else {
                    tool_index.insert(tool.id.clone(), (gi, ti));
                }
            }
        }

        Ok(Registry {
            overmind,
            groups,
            group_index,
            actor_index,
            tool_index,
        })
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.group_index.get(id).map(|&gi| &self.groups[gi])
    }

    pub fn actor(&self, id: &str) -> Option<&Actor> {
        self.actor_index
            .get(id)
            .map(|&(gi, mi)| &self.groups[gi].members[mi])
    }

    /// Group the actor was declared in (first declaration on collisions).
    pub fn actor_group(&self, actor_id: &str) -> Option<&Group> {
        self.actor_index.get(actor_id).map(|&(gi, _)| &self.groups[gi])
    }

    /// Global tool lookup. Advisory: prefer [`Registry::tool_in_group`] when
    /// the group is known, since ids are only unique per group.
    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.tool_index
            .get(id)
            .map(|&(gi, ti)| &self.groups[gi].toolbelt[ti])
    }

    pub fn tool_in_group(&self, group_id: &str, tool_id: &str) -> Option<&Tool> {
        self.group(group_id).and_then(|g| g.tool(tool_id))
    }

    /// Every actor in the roster, in declaration order.
    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.groups.iter().flat_map(|g| g.members.iter())
    }

    /// Actors across all groups whose owned set contains the tool id.
    pub fn owners_of(&self, tool_id: &str) -> Vec<&Actor> {
        self.actors().filter(|a| a.owns(tool_id)).collect()
    }
}

fn build_group(doc: GroupDoc) -> Result<Group> {
    let GroupDoc {
        id,
        name,
        charter,
        verbosity,
        routing,
        toolbelt,
        members,
    } = doc;

    let mut tool_ids = HashSet::new();
    for tool in &toolbelt {
        if !tool_ids.insert(tool.id.as_str()) {
            return Err(MusterError::DuplicateToolId {
                group: id,
                tool: tool.id.clone(),
            });
        }
    }
    let mut member_ids = HashSet::new();
    for member in &members {
        if !member_ids.insert(member.id.as_str()) {
            return Err(MusterError::DuplicateMemberId {
                group: id,
                member: member.id.clone(),
            });
        }
    }
    for tool in &toolbelt {
        if !member_ids.contains(tool.owner.as_str()) {
            return Err(MusterError::UnknownToolOwner {
                group: id,
                tool: tool.id.clone(),
                owner: tool.owner.clone(),
            });
        }
    }
    for member in &members {
        for tool_id in &member.tools {
            if !tool_ids.contains(tool_id.as_str()) {
                return Err(MusterError::UnknownDeclaredTool {
                    group: id,
                    member: member.id.clone(),
                    tool: tool_id.clone(),
                });
            }
        }
    }

    let members = members
        .into_iter()
        .map(|m| reconcile_member(m, &toolbelt, &id))
        .collect();
    let toolbelt = toolbelt
        .into_iter()
        .map(|t| Tool {
            id: t.id,
            name: t.name,
            command: t.command,
            summary: t.summary,
            owner: t.owner,
            docs: t.docs,
            tags: t.tags,
            args: t.args,
            group_id: id.clone(),
        })
        .collect();

    Ok(Group {
        id,
        name,
        charter,
        verbosity,
        toolbelt,
        members,
        routing,
    })
}

/// Rebuilds one member with the ownership closure applied: any group tool
/// naming this member as owner is appended (toolbelt order) when the
/// declared list omits it. Pure and idempotent.
fn reconcile_member(doc: MemberDoc, toolbelt: &[ToolDoc], group_id: &str) -> Actor {
    let MemberDoc {
        id,
        name,
        title,
        model_routing,
        responsibilities,
        kpis,
        tools,
        selection_rules,
    } = doc;

    let appended: Vec<String> = toolbelt
        .iter()
        .filter(|t| t.owner == id && !tools.contains(&t.id))
        .map(|t| t.id.clone())
        .collect();
    if !appended.is_empty() {
        tracing::debug!(
            actor = %id,
            tools = ?appended,
            "owned tools missing from declared list; appended"
        );
    }
    let tools = tools.into_iter().chain(appended).collect();

    Actor {
        id,
        name,
        title,
        model_routing,
        responsibilities,
        kpis,
        tools,
        selection_rules,
        group_id: group_id.to_string(),
    }
}
