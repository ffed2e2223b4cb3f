pub mod cli;
pub mod error;
pub mod models;
pub mod services;
pub mod sources;
pub mod utils;

pub use cli::{Cli, Mode};
pub use error::{ConfigError, EmbeddingError, IndexError, QueryError, VectorStoreError};
pub use models::{Config, OutputFormat};
