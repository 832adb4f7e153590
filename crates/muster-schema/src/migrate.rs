//! Legacy-shape migration for roster documents.
//!
//! Runs before typed deserialization as an ordered pipeline of pure
//! `Value -> Value` transforms. Each step documents the exact shape it
//! accepts and the shape it produces; a step that touches nothing passes the
//! document through unchanged, so migrating an already-canonical document is
//! a no-op.

use serde_yaml::{Mapping, Value};

use crate::error::SchemaError;

/// Version of the migration pipeline below. Bump when a step is added.
pub const ROSTER_SCHEMA_VERSION: u32 = 1;

type Step = fn(Value) -> Result<Value, String>;

const PIPELINE: &[(&str, Step)] = &[
    ("fold-routing-aliases", fold_routing_aliases),
    ("normalize-tool-shapes", normalize_tool_shapes),
    ("synthesize-identities", synthesize_identities),
];

/// Runs every migration step in order over a raw document value.
pub fn migrate(mut doc: Value) -> Result<Value, SchemaError> {
    for (name, step) in PIPELINE.iter().copied() {
        doc = step(doc).map_err(|detail| SchemaError::Migration { step: name, detail })?;
        tracing::debug!(step = name, "roster migration step applied");
    }
    Ok(doc)
}

/// Step 1: the model-routing block is accepted under the legacy key `brain`
/// as well as the canonical `model_routing`, on the overmind and on every
/// member.
///
/// Input: node with `brain: {...}` and/or `model_routing: {...}`.
/// Output: node with only `model_routing`. When both keys are present the
/// canonical block wins and the legacy one is dropped with a warning.
fn fold_routing_aliases(mut doc: Value) -> Result<Value, String> {
    if let Some(overmind) = doc.get_mut("overmind") {
        fold_alias_on(overmind, "overmind");
    }
    for_each_member(&mut doc, |label, member| {
        fold_alias_on(member, label);
        Ok(())
    })?;
    Ok(doc)
}

fn fold_alias_on(node: &mut Value, label: &str) {
    let Some(m) = node.as_mapping_mut() else {
        return;
    };
    if let Some(brain) = m.remove("brain") {
        if m.contains_key("model_routing") {
            tracing::warn!(node = label, "legacy 'brain' block ignored; 'model_routing' present");
        } else {
            m.insert(str_key("model_routing"), brain);
        }
    }
}

/// Step 2: flatten legacy tool-ownership objects and scalar embeddings.
///
/// Input: member with `tools: { owned: [...], selection_rules: [...] }`, and
/// any `model_routing` with `embeddings: <scalar>`.
/// Output: `tools` is a flat id list; lifted selection rules are appended
/// after any member-level `selection_rules` (declaration order preserved);
/// `embeddings` is always a list.
fn normalize_tool_shapes(mut doc: Value) -> Result<Value, String> {
    if let Some(overmind) = doc.get_mut("overmind") {
        listify_embeddings(overmind);
    }
    for_each_member(&mut doc, |label, member| {
        listify_embeddings(member);
        flatten_member_tools(label, member)
    })?;
    Ok(doc)
}

fn listify_embeddings(node: &mut Value) {
    let Some(routing) = node.get_mut("model_routing").and_then(Value::as_mapping_mut) else {
        return;
    };
    if matches!(routing.get("embeddings"), Some(Value::String(_))) {
        if let Some(scalar) = routing.remove("embeddings") {
            routing.insert(str_key("embeddings"), Value::Sequence(vec![scalar]));
        }
    }
}

fn flatten_member_tools(label: &str, member: &mut Value) -> Result<(), String> {
    let Some(m) = member.as_mapping_mut() else {
        return Ok(());
    };
    if !matches!(m.get("tools"), Some(Value::Mapping(_))) {
        return Ok(());
    }
    let Some(Value::Mapping(mut legacy)) = m.remove("tools") else {
        return Ok(());
    };
    let owned = match legacy.remove("owned") {
        None => Value::Sequence(Vec::new()),
        Some(v @ Value::Sequence(_)) => v,
        Some(_) => return Err(format!("member '{label}': tools.owned must be a list")),
    };
    m.insert(str_key("tools"), owned);

    match legacy.remove("selection_rules") {
        None => {}
        Some(Value::Sequence(lifted)) => match m.get_mut("selection_rules").and_then(Value::as_sequence_mut) {
            Some(existing) => existing.extend(lifted),
            None => {
                m.insert(str_key("selection_rules"), Value::Sequence(lifted));
            }
        },
        Some(_) => return Err(format!("member '{label}': tools.selection_rules must be a list")),
    }
    Ok(())
}

/// Step 3: synthesize missing identities.
///
/// Input: groups or members without `id`, members without `name`.
/// Output: group ids slugified from names; member ids slugified from names
/// (falling back to titles); member display names defaulted from titles,
/// else title-cased from ids.
fn synthesize_identities(mut doc: Value) -> Result<Value, String> {
    let Some(groups) = doc.get_mut("groups").and_then(Value::as_sequence_mut) else {
        return Ok(doc);
    };
    for (gi, group) in groups.iter_mut().enumerate() {
        let Some(gm) = group.as_mapping_mut() else {
            continue;
        };
        if !has_string(gm, "id") {
            let name = string_of(gm, "name")
                .ok_or_else(|| format!("group at index {gi} has neither id nor name"))?;
            let slug = slugify(&name);
            if slug.is_empty() {
                return Err(format!("group name '{name}' slugifies to an empty id"));
            }
            gm.insert(str_key("id"), Value::String(slug));
        }
        let group_label = string_of(gm, "id").unwrap_or_else(|| format!("#{gi}"));

        let Some(members) = gm.get_mut("members").and_then(Value::as_sequence_mut) else {
            continue;
        };
        for (mi, member) in members.iter_mut().enumerate() {
            let Some(mm) = member.as_mapping_mut() else {
                continue;
            };
            if !has_string(mm, "id") {
                let source = string_of(mm, "name")
                    .or_else(|| string_of(mm, "title"))
                    .ok_or_else(|| {
                        format!("member at index {mi} in group '{group_label}' has neither id, name, nor title")
                    })?;
                let slug = slugify(&source);
                if slug.is_empty() {
                    return Err(format!(
                        "member name '{source}' in group '{group_label}' slugifies to an empty id"
                    ));
                }
                mm.insert(str_key("id"), Value::String(slug));
            }
            if !has_string(mm, "name") {
                let display = match string_of(mm, "title") {
                    Some(title) => title,
                    None => match string_of(mm, "id") {
                        Some(id) => title_case(&id),
                        None => continue,
                    },
                };
                mm.insert(str_key("name"), Value::String(display));
            }
        }
    }
    Ok(doc)
}

/// Lowercases, strips non-alphanumerics, and collapses the gaps to single
/// hyphens: `"Ember Code!"` becomes `"ember-code"`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut gap = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            gap = false;
        } else if !gap {
            out.push('-');
            gap = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Turns an id back into a display name: `"mage-seer"` becomes `"Mage Seer"`.
pub fn title_case(id: &str) -> String {
    id.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn for_each_member(
    doc: &mut Value,
    mut f: impl FnMut(&str, &mut Value) -> Result<(), String>,
) -> Result<(), String> {
    let Some(groups) = doc.get_mut("groups").and_then(Value::as_sequence_mut) else {
        return Ok(());
    };
    for group in groups.iter_mut() {
        let Some(members) = group.get_mut("members").and_then(Value::as_sequence_mut) else {
            continue;
        };
        for (mi, member) in members.iter_mut().enumerate() {
            let label = member
                .get("id")
                .or_else(|| member.get("name"))
                .or_else(|| member.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{mi}"));
            f(&label, member)?;
        }
    }
    Ok(())
}

fn str_key(k: &str) -> Value {
    Value::String(k.to_string())
}

fn has_string(m: &Mapping, k: &str) -> bool {
    matches!(m.get(k), Some(Value::String(s)) if !s.trim().is_empty())
}

fn string_of(m: &Mapping, k: &str) -> Option<String> {
    match m.get(k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}
