//! Vector store abstraction layer.
//!
//! The rest of the crate only talks to a collection through [`VectorStore`]:
//! upsert documents by id, count them, and run a similarity query with free
//! text. Embedding and ranking happen behind the trait.

mod sqlite;

pub use sqlite::SqliteStore;

use std::path::{Path, PathBuf};

use crate::error::VectorStoreError;
use crate::models::{
    COLLECTION_NAME, EmbeddingConfig, RecordMetadata, STORE_DB_FILE, STORE_DIR_NAME,
};
use crate::services::embedding::create_embedder;

/// Distance metric every collection is created with.
pub const DISTANCE_METRIC: &str = "cosine";

/// A ranked hit returned by [`VectorStore::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub metadata: RecordMetadata,
    /// Cosine distance, lower is closer
    pub distance: f32,
}

/// A persistent, named collection of embedded documents.
pub trait VectorStore {
    /// Get the collection name.
    fn collection(&self) -> &str;

    /// Number of records in the collection.
    fn count(&self) -> Result<u64, VectorStoreError>;

    /// Insert or replace records by id. The three vectors are parallel.
    fn upsert(
        &mut self,
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<RecordMetadata>,
    ) -> Result<(), VectorStoreError>;

    /// Up to `limit` records closest to `text`, nearest first.
    fn query(&self, text: &str, limit: usize) -> Result<Vec<QueryMatch>, VectorStoreError>;
}

/// Directory holding the store for the tree rooted at `root`.
fn store_dir(root: &Path) -> PathBuf {
    root.join(STORE_DIR_NAME)
}

/// Create or open the `files` collection stored under `root`.
pub fn open_store(root: &Path, config: &EmbeddingConfig) -> Result<SqliteStore, VectorStoreError> {
    let db_path = store_dir(root).join(STORE_DB_FILE);
    SqliteStore::open(&db_path, COLLECTION_NAME, create_embedder(config))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory store that records every upsert call.

    use super::*;

    #[derive(Debug, Default)]
    pub struct RecordingStore {
        pub batches: Vec<Vec<String>>,
        pub records: Vec<(String, String, RecordMetadata)>,
        pub canned: Vec<QueryMatch>,
    }

    impl VectorStore for RecordingStore {
        fn collection(&self) -> &str {
            COLLECTION_NAME
        }

        fn count(&self) -> Result<u64, VectorStoreError> {
            Ok(self.records.len() as u64)
        }

        fn upsert(
            &mut self,
            ids: Vec<String>,
            documents: Vec<String>,
            metadatas: Vec<RecordMetadata>,
        ) -> Result<(), VectorStoreError> {
            self.batches.push(ids.clone());
            for ((id, document), metadata) in ids.into_iter().zip(documents).zip(metadatas) {
                self.records.retain(|(existing, _, _)| existing != &id);
                self.records.push((id, document, metadata));
            }
            Ok(())
        }

        fn query(&self, _text: &str, limit: usize) -> Result<Vec<QueryMatch>, VectorStoreError> {
            Ok(self.canned.iter().take(limit).cloned().collect())
        }
    }
}
