use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

/// Name of the store directory created inside the indexed tree.
pub const STORE_DIR_NAME: &str = ".dirsearch";
pub const STORE_DB_FILE: &str = "store.sqlite3";
pub const COLLECTION_NAME: &str = "files";

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_000_000;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_NUM_RESULTS: u32 = 5;
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

pub const CONFIG_ENV_VAR: &str = "DIRSEARCH_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dirsearch").join("config.toml"))
    }

    /// Load from `path` if given, otherwise from the default location.
    ///
    /// An explicitly given path must exist; the default location is optional.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::PathError(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::parse_file(path)?
            }
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::parse_file(&path)?,
                _ => Self::default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indexing.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "indexing.batch_size must be at least 1".to_string(),
            ));
        }
        if self.indexing.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "indexing.max_file_size must be at least 1".to_string(),
            ));
        }
        if self.embedding.hash_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.hash_dimension must be at least 1".to_string(),
            ));
        }
        if self.search.default_limit == 0 {
            return Err(ConfigError::ValidationError(
                "search.default_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    #[serde(default = "default_binary_extensions")]
    pub binary_extensions: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_skip_dirs() -> Vec<String> {
    [
        ".git",
        ".hg",
        ".svn",
        "__pycache__",
        ".mypy_cache",
        ".pytest_cache",
        "node_modules",
        ".tox",
        ".venv",
        "venv",
        "env",
        STORE_DIR_NAME,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_binary_extensions() -> Vec<String> {
    [
        // Images
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp",
        // Audio/video
        "mp3", "mp4", "wav", "avi", "mov", "mkv", "flac",
        // Archives
        "zip", "tar", "gz", "bz2", "xz", "7z", "rar",
        // Documents
        "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
        // Compiled
        "exe", "dll", "so", "dylib", "o", "a", "pyc", "pyo", "class", "wasm",
        // Data
        "bin", "dat", "db", "sqlite",
        // Fonts
        "ttf", "otf", "woff", "woff2", "eot",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            skip_dirs: default_skip_dirs(),
            binary_extensions: default_binary_extensions(),
            max_file_size: default_max_file_size(),
            batch_size: default_batch_size(),
            exclude_patterns: Vec::new(),
        }
    }
}

/// Which embedder the store uses to vectorize documents and queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local ONNX sentence-embedding model
    #[default]
    Onnx,
    /// Feature-hashing bag-of-words, no model files required
    Hash,
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Onnx => write!(f, "onnx"),
            EmbeddingProvider::Hash => write!(f, "hash"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_hash_dimension")]
    pub hash_dimension: usize,
}

fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dirsearch")
        .join("models")
        .join(DEFAULT_MODEL_NAME)
}

fn default_max_tokens() -> u32 {
    256
}

fn default_hash_dimension() -> usize {
    256
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model_dir: default_model_dir(),
            max_tokens: default_max_tokens(),
            hash_dimension: default_hash_dimension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_limit() -> u32 {
    DEFAULT_NUM_RESULTS
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_format: OutputFormat::Text,
        }
    }
}
