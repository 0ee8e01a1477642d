//! Configuration management for the indexd node.
//!
//! This module handles loading configuration from TOML files and
//! environment variables, with sensible defaults for all settings.

use crate::core::error::{IndexdError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Smallest writer heap tantivy accepts per indexing thread
pub const MIN_HEAP_PER_THREAD: usize = 15_000_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base directory all session paths are resolved against
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Locking strategy kind (see `BackendResolver`)
    #[serde(default = "default_lock_kind")]
    pub lock_kind: String,

    /// Storage medium kind (see `BackendResolver`)
    #[serde(default = "default_directory_kind")]
    pub directory_kind: String,
}

/// Index writer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriterConfig {
    /// Memory budget shared by the writer's indexing threads
    #[serde(default = "default_heap_size")]
    pub heap_size_bytes: usize,

    /// Indexing threads per session writer
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

/// RPC listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Session search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Hits returned when a search names no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper bound on hits per search
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

// Default value functions
fn default_root_dir() -> PathBuf {
    PathBuf::from("target/indexes")
}

fn default_lock_kind() -> String {
    "native".to_string()
}

fn default_directory_kind() -> String {
    "mmap".to_string()
}

fn default_heap_size() -> usize {
    50_000_000
}

fn default_num_threads() -> usize {
    1
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    15984
}

fn default_limit() -> usize {
    25
}

fn default_max_limit() -> usize {
    200
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            lock_kind: default_lock_kind(),
            directory_kind: default_directory_kind(),
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            heap_size_bytes: default_heap_size(),
            num_threads: default_num_threads(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| IndexdError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Location of the per-user config file, if the platform has one
    pub fn user_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("indexd").join("config.toml"))
    }

    /// Load config with priority: env vars > TOML > defaults
    ///
    /// File lookup order:
    /// 1. INDEXD_CONFIG env var
    /// 2. User config file (~/.config/indexd/config.toml)
    /// 3. ./indexd.toml
    /// 4. Defaults
    pub fn load() -> Result<Self> {
        let mut config = if let Ok(config_path) = env::var("INDEXD_CONFIG") {
            Self::from_file(config_path)?
        } else {
            match Self::user_config_file().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None if Path::new("indexd.toml").exists() => Self::from_file("indexd.toml")?,
                None => Self::default(),
            }
        };

        config.merge_env();
        config.validate()?;

        Ok(config)
    }

    /// Merge configuration with environment variables
    pub fn merge_env(&mut self) {
        // Storage configuration
        if let Ok(root_dir) = env::var("INDEXD_ROOT_DIR") {
            self.storage.root_dir = PathBuf::from(root_dir);
        }
        if let Ok(kind) = env::var("INDEXD_LOCK_KIND") {
            self.storage.lock_kind = kind;
        }
        if let Ok(kind) = env::var("INDEXD_DIRECTORY_KIND") {
            self.storage.directory_kind = kind;
        }

        // Writer configuration
        if let Ok(heap) = env::var("INDEXD_HEAP_SIZE_BYTES") {
            if let Ok(bytes) = heap.parse() {
                self.writer.heap_size_bytes = bytes;
            }
        }

        // Server configuration
        if let Ok(host) = env::var("INDEXD_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("INDEXD_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.storage.root_dir.as_os_str().is_empty() {
            return Err(IndexdError::ConfigError(
                "Root dir must not be empty".to_string(),
            ));
        }

        if self.storage.lock_kind.trim().is_empty() || self.storage.directory_kind.trim().is_empty()
        {
            return Err(IndexdError::ConfigError(
                "Backend kinds must not be empty".to_string(),
            ));
        }

        if self.writer.num_threads == 0 {
            return Err(IndexdError::ConfigError(
                "Writer threads must be non-zero".to_string(),
            ));
        }

        if self.writer.heap_size_bytes < MIN_HEAP_PER_THREAD * self.writer.num_threads {
            return Err(IndexdError::ConfigError(format!(
                "Writer heap must be at least {} bytes per thread",
                MIN_HEAP_PER_THREAD
            )));
        }

        if self.search.default_limit == 0 {
            return Err(IndexdError::ConfigError(
                "Default limit must be non-zero".to_string(),
            ));
        }

        if self.search.default_limit > self.search.max_limit {
            return Err(IndexdError::ConfigError(
                "Default limit cannot exceed max limit".to_string(),
            ));
        }

        Ok(())
    }

    /// Log configuration
    pub fn log_config(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Root dir: {:?}", self.storage.root_dir);
        tracing::info!("  Lock kind: {}", self.storage.lock_kind);
        tracing::info!("  Directory kind: {}", self.storage.directory_kind);
        tracing::info!(
            "  Writer: {} bytes, {} thread(s)",
            self.writer.heap_size_bytes,
            self.writer.num_threads
        );
        tracing::info!("  Listen: {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  Search limit: {} (max {})",
            self.search.default_limit,
            self.search.max_limit
        );
    }
}
