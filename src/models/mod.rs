mod config;
mod record;
mod search;

pub use config::{
    COLLECTION_NAME, CONFIG_ENV_VAR, Config, DEFAULT_BATCH_SIZE, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_MODEL_NAME, DEFAULT_NUM_RESULTS, EmbeddingConfig, EmbeddingProvider, IndexingConfig,
    STORE_DB_FILE, STORE_DIR_NAME, SearchConfig,
};
pub use record::{IndexedRecord, RecordMetadata};
pub use search::{OutputFormat, QueryResult, QueryResults};
