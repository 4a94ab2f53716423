//! Generator configuration
//!
//! Resolution order, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. YAML file (`--config`, or `metaconst.yaml` in the working directory)
//! 3. `METACONST_*` environment variables (a `.env` file is loaded by the CLI)
//! 4. Command-line flags, applied by the binary

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Collection;
use crate::source::{HttpMetadataSource, MetadataSource, RetryPolicy, SnapshotSource};

pub const DEFAULT_CONFIG_FILE: &str = "metaconst.yaml";
pub const DEFAULT_OUTPUT: &str = "generated/constants.ts";

const ENV_PREFIX: &str = "METACONST_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Server base URL, e.g. `http://localhost:8080/nuxeo`
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Artifact path
    pub output: PathBuf,
    /// Collections to fetch and render
    pub collections: Vec<Collection>,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
    /// Sort records by key before resolving, so names do not depend on
    /// server ordering
    pub canonical_order: bool,
    /// Read metadata from this snapshot directory instead of the server
    pub snapshot_dir: Option<PathBuf>,
    /// Save every fetched collection here
    pub save_snapshot_dir: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            base_url: None,
            username: None,
            password: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
            collections: Collection::ALL.to_vec(),
            max_attempts: retry.max_attempts,
            initial_backoff_ms: retry.initial_backoff.as_millis() as u64,
            max_backoff_ms: retry.max_backoff.as_millis() as u64,
            timeout_secs: 30,
            canonical_order: true,
            snapshot_dir: None,
            save_snapshot_dir: None,
        }
    }
}

impl GeneratorConfig {
    /// Load defaults, then the YAML file, then the process environment.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_yaml_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Overlay `METACONST_*` variables resolved through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        if let Some(v) = var("BASE_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = var("USERNAME") {
            self.username = Some(v);
        }
        if let Some(v) = var("PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = var("OUTPUT") {
            self.output = PathBuf::from(v);
        }
        if let Some(v) = var("COLLECTIONS") {
            self.collections = parse_collection_list(&v)?;
        }
        if let Some(v) = var("MAX_ATTEMPTS") {
            self.max_attempts = v
                .trim()
                .parse()
                .with_context(|| format!("{}MAX_ATTEMPTS must be a number", ENV_PREFIX))?;
        }
        if let Some(v) = var("INITIAL_BACKOFF_MS") {
            self.initial_backoff_ms = v
                .trim()
                .parse()
                .with_context(|| format!("{}INITIAL_BACKOFF_MS must be a number", ENV_PREFIX))?;
        }
        if let Some(v) = var("MAX_BACKOFF_MS") {
            self.max_backoff_ms = v
                .trim()
                .parse()
                .with_context(|| format!("{}MAX_BACKOFF_MS must be a number", ENV_PREFIX))?;
        }
        if let Some(v) = var("TIMEOUT_SECS") {
            self.timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{}TIMEOUT_SECS must be a number", ENV_PREFIX))?;
        }
        if let Some(v) = var("CANONICAL_ORDER") {
            self.canonical_order = parse_bool(&v)
                .ok_or_else(|| anyhow!("{}CANONICAL_ORDER must be true or false", ENV_PREFIX))?;
        }
        if let Some(v) = var("SNAPSHOT_DIR") {
            self.snapshot_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("SAVE_SNAPSHOT_DIR") {
            self.save_snapshot_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_none() && self.snapshot_dir.is_none() {
            bail!(
                "No metadata source configured: set base_url ({}BASE_URL) or snapshot_dir",
                ENV_PREFIX
            );
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.collections.is_empty() {
            bail!("At least one collection must be selected");
        }
        if self.output.as_os_str().is_empty() {
            bail!("output path must not be empty");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the configured source. A snapshot directory wins over a URL.
    pub fn build_source(&self) -> Result<Box<dyn MetadataSource>> {
        if let Some(dir) = &self.snapshot_dir {
            return Ok(Box::new(SnapshotSource::new(dir)));
        }

        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| anyhow!("base_url is not set"))?;
        let mut source = HttpMetadataSource::new(base_url, self.timeout())
            .with_context(|| format!("Failed to create HTTP client for {}", base_url))?
            .with_retry(self.retry_policy());
        if let Some(username) = &self.username {
            source = source.with_credentials(username.clone(), self.password.clone());
        }
        Ok(Box::new(source))
    }
}

/// Comma- or whitespace-separated collection names.
pub fn parse_collection_list(list: &str) -> Result<Vec<Collection>> {
    let mut collections = Vec::new();
    for name in list.split(|c: char| c == ',' || c.is_whitespace()) {
        if name.is_empty() {
            continue;
        }
        let collection: Collection = name.parse().map_err(|e: String| anyhow!(e))?;
        if !collections.contains(&collection) {
            collections.push(collection);
        }
    }
    Ok(collections)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
