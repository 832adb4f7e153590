//! Roster discovery and the registry cache.
//!
//! A roster is located through an ordered search: explicit path, then the
//! `MUSTER_CONFIG` override, then `muster.yaml` in the working directory and
//! each ancestor directory. Built registries are cached by resolved path in
//! a caller-owned [`RegistryCache`]; nothing here is global state.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use muster_schema::{parse_roster, RosterDoc};

use crate::error::{MusterError, Result};
use crate::registry::Registry;

/// Environment variable naming the roster file.
pub const CONFIG_ENV_VAR: &str = "MUSTER_CONFIG";

/// File name probed in the working directory and its ancestors.
pub const DEFAULT_FILE_NAME: &str = "muster.yaml";

/// Locates the roster file for this process.
///
/// An explicit path or a nonempty `MUSTER_CONFIG` value is authoritative
/// even if the file is missing; a typo there should fail the load, not
/// silently fall through to some other roster.
pub fn resolve_roster_path(explicit: Option<&Path>) -> Result<PathBuf> {
    let env_override = env::var(CONFIG_ENV_VAR).ok();
    let start = env::current_dir().map_err(|source| MusterError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    resolve_from(explicit, env_override.as_deref(), &start)
}

fn resolve_from(
    explicit: Option<&Path>,
    env_override: Option<&str>,
    start_dir: &Path,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(value) = env_override {
        let value = value.trim();
        if !value.is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    let mut searched = Vec::new();
    for dir in start_dir.ancestors() {
        let candidate = dir.join(DEFAULT_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        searched.push(candidate.display().to_string());
    }
    Err(MusterError::RosterNotFound {
        searched: searched.join(", "),
    })
}

/// One-shot uncached load. Resolution follows [`resolve_roster_path`].
pub fn load_registry(explicit: Option<&Path>) -> Result<Registry> {
    let path = resolve_roster_path(explicit)?;
    let yaml = read_roster(&path)?;
    build_registry(&yaml)
}

fn read_roster(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| MusterError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn build_registry(yaml: &str) -> Result<Registry> {
    let mut doc = parse_roster(yaml)?;
    expand_roster_env(&mut doc);
    Registry::build(doc)
}

/// Expands `${VAR}` placeholders in every tool command. Other fields are
/// taken literally; commands are the one place operator environments leak
/// into the roster.
fn expand_roster_env(doc: &mut RosterDoc) {
    for group in &mut doc.groups {
        for tool in &mut group.toolbelt {
            tool.command = expand_env(&tool.command);
        }
    }
}

/// `${VAR}` substitution from the process environment. Unset variables
/// expand to the empty string; an unclosed `${` is left verbatim.
pub fn expand_env(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Caller-owned cache of built registries, keyed by resolved roster path.
///
/// Entries are `Arc`s, so handing a registry to consumers is cheap and an
/// invalidated entry stays alive for anyone still holding it.
#[derive(Debug, Default)]
pub struct RegistryCache {
    entries: HashMap<PathBuf, Arc<Registry>>,
}

impl RegistryCache {
    pub fn new() -> Self {
        RegistryCache::default()
    }

    /// Cached load; parses only on a miss.
    pub fn load(&mut self, explicit: Option<&Path>) -> Result<Arc<Registry>> {
        self.load_with(explicit, false)
    }

    /// `reload` forces a re-parse and replaces the cache entry.
    pub fn load_with(&mut self, explicit: Option<&Path>, reload: bool) -> Result<Arc<Registry>> {
        let path = resolve_roster_path(explicit)?;
        let key = cache_key(&path);
        if !reload {
            if let Some(registry) = self.entries.get(&key) {
                tracing::debug!(path = %key.display(), "registry cache hit");
                return Ok(Arc::clone(registry));
            }
        }
        let registry = Arc::new(build_registry(&read_roster(&path)?)?);
        tracing::info!(
            path = %key.display(),
            groups = registry.groups().len(),
            "registry loaded"
        );
        self.entries.insert(key, Arc::clone(&registry));
        Ok(registry)
    }

    /// Async variant of [`RegistryCache::load`].
    pub async fn load_async(&mut self, explicit: Option<&Path>) -> Result<Arc<Registry>> {
        let path = resolve_roster_path(explicit)?;
        let key = cache_key(&path);
        if let Some(registry) = self.entries.get(&key) {
            tracing::debug!(path = %key.display(), "registry cache hit");
            return Ok(Arc::clone(registry));
        }
        let yaml = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| MusterError::Io {
                path: path.clone(),
                source,
            })?;
        let registry = Arc::new(build_registry(&yaml)?);
        tracing::info!(
            path = %key.display(),
            groups = registry.groups().len(),
            "registry loaded"
        );
        self.entries.insert(key, Arc::clone(&registry));
        Ok(registry)
    }

    /// Drops the entry for `path`. Returns whether one was present.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(&cache_key(path)).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Canonicalization folds `./muster.yaml` and its absolute spelling into one
// entry; a path that cannot be canonicalized keys as written.
fn cache_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ROSTER: &str = r#"
overmind:
  name: overmind
  title: Coordinator
groups:
  - name: Forge
    charter: build and ship
    toolbelt:
      - id: build-bundle
        name: Build Bundle
        command: cd app && build
        summary: production bundle
        owner: embercode
    members:
      - name: Embercode
        title: Build Lead
        responsibilities:
          - builds
        tools:
          - build-bundle
"#;

    fn write_roster(dir: &Path, name: &str, yaml: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        path
    }

    #[test]
    fn explicit_path_wins_over_directory_default() {
        let dir = tempfile::tempdir().unwrap();
        write_roster(dir.path(), DEFAULT_FILE_NAME, ROSTER);
        let other = write_roster(dir.path(), "other.yaml", ROSTER);

        let resolved = resolve_from(Some(&other), None, dir.path()).unwrap();
        assert_eq!(resolved, other);
    }

    #[test]
    fn env_override_is_authoritative() {
        let dir = tempfile::tempdir().unwrap();
        write_roster(dir.path(), DEFAULT_FILE_NAME, ROSTER);

        let resolved = resolve_from(None, Some("/etc/muster/roster.yaml"), dir.path()).unwrap();
        assert_eq!(resolved, PathBuf::from("/etc/muster/roster.yaml"));
    }

    #[test]
    fn blank_env_override_falls_through_to_search() {
        let dir = tempfile::tempdir().unwrap();
        let default = write_roster(dir.path(), DEFAULT_FILE_NAME, ROSTER);

        let resolved = resolve_from(None, Some("  "), dir.path()).unwrap();
        assert_eq!(resolved, default);
    }

    #[test]
    fn search_walks_ancestor_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        let root_roster = write_roster(dir.path(), DEFAULT_FILE_NAME, ROSTER);

        let resolved = resolve_from(None, None, &nested).unwrap();
        assert_eq!(resolved, root_roster);
    }

    #[test]
    fn missing_roster_reports_searched_locations() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("empty");
        fs::create_dir_all(&nested).unwrap();

        let err = resolve_from(None, None, &nested).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("no roster file found"), "{message}");
        assert!(message.contains(DEFAULT_FILE_NAME), "{message}");
    }

    #[test]
    fn load_registry_reads_and_builds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_roster(dir.path(), DEFAULT_FILE_NAME, ROSTER);

        let registry = load_registry(Some(&path)).unwrap();
        assert!(registry.actor("embercode").is_some());
        assert_eq!(
            registry.tool_in_group("forge", "build-bundle").unwrap().command,
            "cd app && build"
        );
    }

    #[test]
    fn missing_explicit_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");

        let err = load_registry(Some(&missing)).unwrap_err();
        assert!(matches!(err, MusterError::Io { .. }));
        assert!(err.to_string().contains("nope.yaml"));
    }

    #[test]
    fn cache_returns_the_same_registry_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_roster(dir.path(), DEFAULT_FILE_NAME, ROSTER);

        let mut cache = RegistryCache::new();
        let first = cache.load(Some(&path)).unwrap();
        let second = cache.load(Some(&path)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        // a rewritten roster is invisible until the entry is dropped
        write_roster(dir.path(), DEFAULT_FILE_NAME, &ROSTER.replace("build and ship", "ship only"));
        let stale = cache.load(Some(&path)).unwrap();
        assert_eq!(stale.group("forge").unwrap().charter, "build and ship");

        assert!(cache.invalidate(&path));
        let fresh = cache.load(Some(&path)).unwrap();
        assert_eq!(fresh.group("forge").unwrap().charter, "ship only");
        assert!(!cache.invalidate(&dir.path().join("unrelated.yaml")));
    }

    #[test]
    fn reload_flag_forces_reparse() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_roster(dir.path(), DEFAULT_FILE_NAME, ROSTER);

        let mut cache = RegistryCache::new();
        cache.load(Some(&path)).unwrap();
        write_roster(dir.path(), DEFAULT_FILE_NAME, &ROSTER.replace("build and ship", "rebuilt"));

        let reloaded = cache.load_with(Some(&path), true).unwrap();
        assert_eq!(reloaded.group("forge").unwrap().charter, "rebuilt");
        // the replacement entry serves later plain loads
        let cached = cache.load(Some(&path)).unwrap();
        assert!(Arc::ptr_eq(&reloaded, &cached));
    }

    #[tokio::test]
    async fn async_load_shares_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_roster(dir.path(), DEFAULT_FILE_NAME, ROSTER);

        let mut cache = RegistryCache::new();
        let sync = cache.load(Some(&path)).unwrap();
        let asynced = cache.load_async(Some(&path)).await.unwrap();
        assert!(Arc::ptr_eq(&sync, &asynced));
    }

    #[test]
    fn clear_empties_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_roster(dir.path(), DEFAULT_FILE_NAME, ROSTER);

        let mut cache = RegistryCache::new();
        cache.load(Some(&path)).unwrap();
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn expand_env_replaces_placeholders() {
        let path = env::var("PATH").unwrap();
        assert_eq!(expand_env("${PATH}"), path);
        assert_eq!(expand_env("pre-${PATH}-post"), format!("pre-{path}-post"));
    }

    #[test]
    fn expand_env_passes_plain_text_through() {
        assert_eq!(expand_env("cd app && build"), "cd app && build");
        assert_eq!(expand_env(""), "");
    }

    #[test]
    fn expand_env_unset_variable_becomes_empty() {
        assert_eq!(expand_env("v=${MUSTER_TEST_UNSET_VAR_XYZ}"), "v=");
    }

    #[test]
    fn expand_env_leaves_unclosed_braces_alone() {
        assert_eq!(expand_env("cmd ${UNCLOSED"), "cmd ${UNCLOSED");
    }

    #[test]
    fn tool_commands_are_expanded_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = ROSTER.replace("cd app && build", "run --path ${PATH}");
        let path = write_roster(dir.path(), DEFAULT_FILE_NAME, &yaml);

        let registry = load_registry(Some(&path)).unwrap();
        let expected = format!("run --path {}", env::var("PATH").unwrap());
        assert_eq!(
            registry.tool_in_group("forge", "build-bundle").unwrap().command,
            expected
        );
    }
}
