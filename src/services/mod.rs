mod batch;
pub mod embedding;
pub mod vector_store;

pub use batch::{BatchUpserter, UpsertSummary};
pub use embedding::{Embedder, HashEmbedder, OnnxEmbedder, create_embedder};
pub use vector_store::{QueryMatch, SqliteStore, VectorStore, open_store};
