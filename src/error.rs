//! Error types for dirsearch.

use thiserror::Error;

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("invalid exclude pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to embedding generation.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("failed to load model: {0}")]
    LoadError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("inference error: {0}")]
    InferenceError(String),
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error(
        "collection '{collection}' was built with {expected}, but {actual} is configured; delete the store directory and re-index"
    )]
    IncompatibleCollection {
        collection: String,
        expected: String,
        actual: String,
    },

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("invalid stored value: {0}")]
    InvalidDbValue(String),
}

/// Errors related to indexing operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Errors related to query operations.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Collection is empty. Run --index first.")]
    EmptyCollection,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}
