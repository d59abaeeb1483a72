//! Application configuration for pokefetch.
//!
//! User config lives at `~/.pokefetch/pokefetch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PokefetchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pokefetch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pokefetch";

// ---------------------------------------------------------------------------
// Config structs (matching pokefetch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote service settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Worker pool sizing and failure policy.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Record store and cache locations.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[remote]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the resource API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://pokeapi.co/api/v2/".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// How stage 2 reacts to a failed secondary lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichPolicy {
    /// Drop only the failing record; keep enriching the rest.
    #[default]
    IsolateRecord,
    /// Cancel every worker on the first failure.
    AbortBatch,
}

impl std::str::FromStr for EnrichPolicy {
    type Err = PokefetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "isolate-record" => Ok(Self::IsolateRecord),
            "abort-batch" => Ok(Self::AbortBatch),
            other => Err(PokefetchError::config(format!(
                "unknown failure policy '{other}' (expected isolate-record or abort-batch)"
            ))),
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent primary lookups in stage 1.
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,

    /// Concurrent enrichment workers in stage 2.
    #[serde(default = "default_enrich_workers")]
    pub enrich_workers: usize,

    /// Stage 2 failure policy.
    #[serde(default)]
    pub failure_policy: EnrichPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_workers: default_fetch_workers(),
            enrich_workers: default_enrich_workers(),
            failure_policy: EnrichPolicy::default(),
        }
    }
}

fn default_fetch_workers() -> usize {
    20
}
fn default_enrich_workers() -> usize {
    3
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Flat CSV file holding the stage 1 record set.
    #[serde(default = "default_records_path")]
    pub records_path: String,

    /// libSQL database used as the enriched-record cache.
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
            cache_path: default_cache_path(),
        }
    }
}

fn default_records_path() -> String {
    "resources/pokemons.csv".into()
}
fn default_cache_path() -> String {
    "var/cache/pokefetch.db".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for the bounded fetch pool.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum concurrent primary lookups (W). Never below one.
    pub workers: usize,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            workers: config.pipeline.fetch_workers.max(1),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Runtime configuration for the enrichment stage.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Number of enrichment workers. Never below one.
    pub workers: usize,
    /// What a failed secondary lookup does to the rest of the batch.
    pub policy: EnrichPolicy,
}

impl From<&AppConfig> for EnrichConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            workers: config.pipeline.enrich_workers.max(1),
            policy: config.pipeline.failure_policy,
        }
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pokefetch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PokefetchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pokefetch/pokefetch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PokefetchError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PokefetchError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    url::Url::parse(&config.remote.base_url).map_err(|e| {
        PokefetchError::config(format!(
            "invalid remote.base_url '{}': {e}",
            config.remote.base_url
        ))
    })?;

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PokefetchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PokefetchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PokefetchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("isolate-record"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.fetch_workers, 20);
        assert_eq!(parsed.pipeline.enrich_workers, 3);
        assert_eq!(parsed.storage.records_path, "resources/pokemons.csv");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[pipeline]
enrich_workers = 5
failure_policy = "abort-batch"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.pipeline.fetch_workers, 20);
        assert_eq!(config.pipeline.enrich_workers, 5);
        assert_eq!(config.pipeline.failure_policy, EnrichPolicy::AbortBatch);
        assert_eq!(config.remote.timeout_secs, 30);
    }

    #[test]
    fn runtime_configs_clamp_zero_workers() {
        let mut app = AppConfig::default();
        app.pipeline.fetch_workers = 0;
        app.pipeline.enrich_workers = 0;
        assert_eq!(FetchConfig::from(&app).workers, 1);
        assert_eq!(EnrichConfig::from(&app).workers, 1);
    }

    #[test]
    fn policy_from_str() {
        assert_eq!(
            "abort-batch".parse::<EnrichPolicy>().unwrap(),
            EnrichPolicy::AbortBatch
        );
        assert!("sometimes".parse::<EnrichPolicy>().is_err());
    }

    #[test]
    fn load_rejects_bad_base_url() {
        let dir = std::env::temp_dir().join(format!("pokefetch-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[remote]\nbase_url = \"not a url\"\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("invalid remote.base_url"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
