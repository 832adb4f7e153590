use std::path::PathBuf;

use thiserror::Error;

use crate::fallback::FallbackTrail;

pub type Result<T> = std::result::Result<T, MusterError>;

/// Engine error taxonomy. Expected "no tool matched" outcomes are values on
/// the query APIs, never errors; everything here is exceptional.
#[derive(Debug, Error)]
pub enum MusterError {
    #[error(transparent)]
    Schema(#[from] muster_schema::SchemaError),

    #[error("failed to read roster file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no roster file found (searched: {searched})")]
    RosterNotFound { searched: String },

    #[error("duplicate member id in group {group}: {member}")]
    DuplicateMemberId { group: String, member: String },

    #[error("duplicate tool id in group {group}: {tool}")]
    DuplicateToolId { group: String, tool: String },

    #[error("tool {tool} in group {group} names unknown owner: {owner}")]
    UnknownToolOwner {
        group: String,
        tool: String,
        owner: String,
    },

    #[error("member {member} in group {group} declares unknown tool: {tool}")]
    UnknownDeclaredTool {
        group: String,
        member: String,
        tool: String,
    },

    #[error("actor not found: {0}")]
    UnknownActor(String),

    /// Always fatal; never downgraded to a "no tool" outcome.
    #[error("actor {actor} is not permitted to invoke tool: {tool}")]
    PermissionDenied { actor: String, tool: String },

    #[error("all model candidates failed (tried: {trail})")]
    FallbackExhausted { trail: FallbackTrail },

    #[error("routing policy declares no model candidates")]
    EmptyRoutingPolicy,
}
