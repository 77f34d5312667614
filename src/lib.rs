//! Notekeeper
//!
//! An in-memory note management engine:
//! - Note store with validation/repair invariants
//! - Memoized filter/sort query pipeline
//! - Durable persistence with compression and backup-fallback recovery
//! - Bounded derived-stats cache with time- and size-based eviction
//! - Lifecycle coordinator for cache sweeps and app-state transitions
//!
//! UI layers are thin consumers: they call the engine's operations and render
//! the results. Persistence outcomes are observable through logs only.

pub mod notes;
pub mod storage;

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use notes::{LifecycleConfig, NoteManager};
use storage::{FileBackend, Persister};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub storage: StorageYamlConfig,
    pub engine: EngineYamlConfig,
}

/// Storage configuration section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYamlConfig {
    /// Data directory; defaults to the platform data dir
    pub data_dir: Option<String>,
}

/// Engine tuning section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineYamlConfig {
    pub sweep_interval_secs: u64,
    pub full_clear_every: u64,
    pub memory_limit_mib: u64,
    pub compression_threshold_bytes: usize,
}

impl Default for EngineYamlConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            full_clear_every: 10,
            memory_limit_mib: 100,
            compression_threshold_bytes: storage::DEFAULT_COMPRESSION_THRESHOLD,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub sweep_interval_secs: u64,
    pub full_clear_every: u64,
    pub memory_limit_mib: u64,
    pub compression_threshold_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to `from_yaml_and_env(None)`.
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env
    /// vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file
    /// doesn't exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let data_dir = std::env::var("NOTEKEEPER_DATA_DIR")
            .ok()
            .or(yaml.storage.data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Ok(Self {
            data_dir,
            sweep_interval_secs: env_u64("NOTEKEEPER_SWEEP_INTERVAL_SECS")
                .unwrap_or(yaml.engine.sweep_interval_secs),
            full_clear_every: env_u64("NOTEKEEPER_FULL_CLEAR_EVERY")
                .unwrap_or(yaml.engine.full_clear_every),
            memory_limit_mib: env_u64("NOTEKEEPER_MEMORY_LIMIT_MIB")
                .unwrap_or(yaml.engine.memory_limit_mib),
            compression_threshold_bytes: env_u64("NOTEKEEPER_COMPRESSION_THRESHOLD")
                .map(|v| v as usize)
                .unwrap_or(yaml.engine.compression_threshold_bytes),
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any
    /// failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    /// Lifecycle tuning derived from this config
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            full_clear_every: self.full_clear_every,
            memory_limit_bytes: self.memory_limit_mib * 1024 * 1024,
            ..Default::default()
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notekeeper")
}

// ============================================================================
// Shared application state
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RwLock<NoteManager>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the file backend under the configured data dir and load the
    /// persisted collection
    pub async fn new(config: Config) -> Result<Self> {
        let backend = Arc::new(FileBackend::open(&config.data_dir).await?);
        let persister = Persister::new(backend)
            .with_compression_threshold(config.compression_threshold_bytes);
        let manager = NoteManager::load_with(persister).await;

        Ok(Self {
            manager: Arc::new(RwLock::new(manager)),
            config: Arc::new(config),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
