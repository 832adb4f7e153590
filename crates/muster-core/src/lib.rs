pub mod audit;
pub mod error;
pub mod fallback;
pub mod intent;
pub mod loader;
pub mod registry;
pub mod router;

pub use audit::*;
pub use error::*;
pub use fallback::*;
pub use intent::*;
pub use loader::*;
pub use registry::*;
pub use router::*;

/// One-call dispatch: resolve an actor's free-text intent to a runnable
/// tool command under the default match policy.
pub fn auto_select_tool_command(
    registry: &Registry,
    actor_id: &str,
    intent: &str,
) -> Result<ToolSelection> {
    IntentResolver::new(registry).auto_select(actor_id, intent)
}
