//! Engine configuration
//!
//! Loaded from `~/.mama/config.json` (created with defaults when missing),
//! with environment overrides for the database path, model cache, and tier
//! forcing. Malformed fields fall back to defaults with a warning; config
//! load never fails hard.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default embedding model identifier
pub const DEFAULT_MODEL_NAME: &str = "Xenova/multilingual-e5-small";

/// Default embedding dimension (must match the model's output width)
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Engine configuration
///
/// File-backed fields use camelCase keys. The runtime-only fields
/// (`db_path`, `force_tier3`, `disable_vector_search`) come from the
/// environment or from the embedding host, never from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MamaConfig {
    /// Embedding model identifier
    pub model_name: String,
    /// Required output vector dimension
    pub embedding_dim: usize,
    /// Where the embedding model files are cached
    pub cache_dir: PathBuf,
    /// Database file path override (env `MAMA_DB_PATH`)
    #[serde(skip)]
    pub db_path: Option<PathBuf>,
    /// Skip embeddings entirely (env `MAMA_FORCE_TIER_3`, testing mode)
    #[serde(skip)]
    pub force_tier3: bool,
    /// Disable the vector index (degrades retrieval to keyword-only)
    #[serde(skip)]
    pub disable_vector_search: bool,
}

impl Default for MamaConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            cache_dir: default_cache_dir(),
            db_path: None,
            force_tier3: false,
            disable_vector_search: false,
        }
    }
}

/// Default model cache directory
///
/// `HF_HOME` / `TRANSFORMERS_CACHE` take precedence, then the conventional
/// huggingface cache under the home directory.
fn default_cache_dir() -> PathBuf {
    if let Ok(path) = std::env::var("TRANSFORMERS_CACHE") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Ok(path) = std::env::var("HF_HOME") {
        if !path.is_empty() {
            return PathBuf::from(path).join("transformers");
        }
    }
    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs
            .home_dir()
            .join(".cache/huggingface/transformers");
    }
    PathBuf::from(".hf_cache")
}

/// Default config file location (`~/.mama/config.json`)
fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".mama/config.json"))
}

/// Default database file location (`~/.claude/mama-memory.db`)
pub fn default_db_path() -> PathBuf {
    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".claude/mama-memory.db");
    }
    PathBuf::from("mama-memory.db")
}

impl MamaConfig {
    /// Load configuration from disk and environment.
    ///
    /// Missing file: created with defaults. Unparseable file or invalid
    /// fields: warned and defaulted, field by field.
    pub fn load() -> Self {
        let mut config = match config_file_path() {
            Some(path) => Self::load_file(&path),
            None => {
                tracing::warn!("Could not determine home directory, using default config");
                Self::default()
            }
        };
        config.apply_env();
        config
    }

    fn load_file(path: &std::path::Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match serde_json::to_string_pretty(&config) {
                Ok(json) => {
                    if let Err(e) = std::fs::write(path, json) {
                        tracing::warn!("Failed to write default config to {:?}: {}", path, e);
                    }
                }
                Err(e) => tracing::warn!("Failed to serialize default config: {}", e),
            }
            return config;
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}, using defaults", path, e);
                return Self::default();
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Malformed config {:?}: {}, using defaults", path, e);
                return Self::default();
            }
        };

        // Field-by-field extraction so one bad field doesn't discard the rest.
        let mut config = Self::default();
        match value.get("modelName") {
            Some(serde_json::Value::String(name)) if !name.trim().is_empty() => {
                config.model_name = name.clone();
            }
            Some(other) => {
                tracing::warn!("Invalid modelName {:?}, using default", other);
            }
            None => {}
        }
        match value.get("embeddingDim") {
            Some(dim) => match dim.as_u64() {
                Some(dim) if dim > 0 => config.embedding_dim = dim as usize,
                _ => tracing::warn!("Invalid embeddingDim {:?}, using default", dim),
            },
            None => {}
        }
        match value.get("cacheDir") {
            Some(serde_json::Value::String(dir)) if !dir.trim().is_empty() => {
                config.cache_dir = PathBuf::from(dir);
            }
            Some(other) => {
                tracing::warn!("Invalid cacheDir {:?}, using default", other);
            }
            None => {}
        }
        config
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("MAMA_DB_PATH") {
            if !path.is_empty() {
                self.db_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(value) = std::env::var("MAMA_FORCE_TIER_3") {
            self.force_tier3 = value.eq_ignore_ascii_case("true") || value == "1";
        }
    }

    /// Database path, falling back to the default location.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    /// Log level requested via `MAMA_LOG_LEVEL` / `MAMA_DEBUG`.
    ///
    /// The engine never installs a subscriber; embedding hosts feed this
    /// into their own tracing setup. `NONE` (or an unrecognized value)
    /// yields no level.
    pub fn log_level_from_env() -> Option<tracing::Level> {
        if let Ok(level) = std::env::var("MAMA_LOG_LEVEL") {
            return match level.to_uppercase().as_str() {
                "DEBUG" => Some(tracing::Level::DEBUG),
                "INFO" => Some(tracing::Level::INFO),
                "WARN" => Some(tracing::Level::WARN),
                "ERROR" => Some(tracing::Level::ERROR),
                _ => None,
            };
        }
        match std::env::var("MAMA_DEBUG") {
            Ok(v) if !v.is_empty() && v != "0" => Some(tracing::Level::DEBUG),
            _ => None,
        }
    }
}
