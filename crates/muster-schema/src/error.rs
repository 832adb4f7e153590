use thiserror::Error;

/// Failures while parsing, migrating, or structurally validating a roster
/// document. Cross-reference checks (ownership, duplicates across a group)
/// live downstream in the registry builder.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("empty roster document")]
    EmptyDocument,

    #[error("roster document root must be a mapping")]
    NotAMapping,

    #[error("failed to parse roster yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("migration step '{step}' failed: {detail}")]
    Migration { step: &'static str, detail: String },

    #[error("{0}")]
    Structural(String),
}

impl SchemaError {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        SchemaError::Structural(msg.into())
    }
}
