//! Roster document schema: wire types, legacy-shape migration, structural
//! validation, and the static provider catalog.

pub mod doc;
pub mod error;
pub mod migrate;
pub mod presets;
pub mod validate;

pub use doc::{
    ArgKind, GroupDoc, MemberDoc, ModelRouting, OvermindDoc, RosterDoc, RoutingHints,
    SelectionRuleDoc, TelemetrySettings, ToolArgDoc, ToolDoc, Verbosity,
};
pub use error::SchemaError;
pub use migrate::{migrate, slugify, title_case, ROSTER_SCHEMA_VERSION};
pub use presets::{preset_by_id, ModelRef, ProviderKind, ProviderPreset, PROVIDER_PRESETS};
pub use validate::validate_structure;

/// Parses YAML into a validated roster document.
///
/// Pipeline: raw value, migration of legacy shapes, typed deserialization,
/// structural validation. Cross-reference checks happen later when the
/// registry is built from the returned document.
pub fn parse_roster(yaml: &str) -> Result<RosterDoc, SchemaError> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    if value.is_null() {
        return Err(SchemaError::EmptyDocument);
    }
    if value.as_mapping().is_none() {
        return Err(SchemaError::NotAMapping);
    }
    let migrated = migrate::migrate(value)?;
    let doc: RosterDoc = serde_yaml::from_value(migrated)?;
    validate::validate_structure(&doc)?;
    Ok(doc)
}
