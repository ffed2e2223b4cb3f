//! SQLite-backed vector store.
//!
//! One database file holds any number of named collections. Each record keeps
//! its document text, JSON metadata and a little-endian `f32` embedding blob.
//! Queries embed the text and rank every record of the collection by exact
//! cosine distance.

use std::cmp::Ordering;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use super::{DISTANCE_METRIC, QueryMatch, VectorStore};
use crate::error::VectorStoreError;
use crate::models::RecordMetadata;
use crate::services::embedding::Embedder;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    metric TEXT NOT NULL,
    embedder TEXT NOT NULL,
    dimension INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    document TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
"#;

pub struct SqliteStore {
    conn: Connection,
    collection: String,
    embedder: Box<dyn Embedder>,
    dimension: Option<usize>,
}

impl SqliteStore {
    /// Open the database at `path` and get or create `collection`.
    ///
    /// An existing collection must have been built with the same metric and
    /// embedder, otherwise its distances would be meaningless.
    pub fn open(
        path: &Path,
        collection: &str,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self, VectorStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;

        let mut store = Self {
            conn,
            collection: collection.to_string(),
            embedder,
            dimension: None,
        };
        store.dimension = store.get_or_create_collection()?;

        info!(path = %path.display(), collection, "opened vector store");
        Ok(store)
    }

    fn get_or_create_collection(&self) -> Result<Option<usize>, VectorStoreError> {
        let embedder = self.embedder.name();
        let existing = self
            .conn
            .query_row(
                "SELECT metric, embedder, dimension FROM collections WHERE name = ?1",
                params![self.collection],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            Some((metric, stored_embedder, dimension)) => {
                if metric == DISTANCE_METRIC && stored_embedder == embedder {
                    return dimension
                        .map(|d| {
                            usize::try_from(d).map_err(|_| {
                                VectorStoreError::InvalidDbValue(format!("dimension {}", d))
                            })
                        })
                        .transpose();
                }

                // Nothing is stored yet, so the collection takes on the current settings.
                if self.count()? == 0 {
                    self.conn.execute(
                        "UPDATE collections SET metric = ?2, embedder = ?3, dimension = NULL
                         WHERE name = ?1",
                        params![self.collection, DISTANCE_METRIC, embedder],
                    )?;
                    debug!(
                        collection = %self.collection,
                        previous = %stored_embedder,
                        embedder = %embedder,
                        "rebound empty collection"
                    );
                    return Ok(None);
                }

                if metric != DISTANCE_METRIC {
                    return Err(VectorStoreError::IncompatibleCollection {
                        collection: self.collection.clone(),
                        expected: format!("metric {}", metric),
                        actual: format!("metric {}", DISTANCE_METRIC),
                    });
                }
                Err(VectorStoreError::IncompatibleCollection {
                    collection: self.collection.clone(),
                    expected: stored_embedder,
                    actual: embedder,
                })
            }
            None => {
                self.conn.execute(
                    "INSERT INTO collections (name, metric, embedder, dimension, created_at)
                     VALUES (?1, ?2, ?3, NULL, ?4)",
                    params![
                        self.collection,
                        DISTANCE_METRIC,
                        embedder,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )?;
                debug!(collection = %self.collection, embedder = %embedder, "created collection");
                Ok(None)
            }
        }
    }

    fn check_dimension(&self, actual: usize) -> Result<(), VectorStoreError> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(VectorStoreError::InvalidDimension { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

impl VectorStore for SqliteStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn count(&self) -> Result<u64, VectorStoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn upsert(
        &mut self,
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<RecordMetadata>,
    ) -> Result<(), VectorStoreError> {
        if ids.len() != documents.len() || ids.len() != metadatas.len() {
            return Err(VectorStoreError::UpsertError(format!(
                "mismatched lengths: {} ids, {} documents, {} metadatas",
                ids.len(),
                documents.len(),
                metadatas.len()
            )));
        }
        if ids.is_empty() {
            return Ok(());
        }

        let embeddings = self.embedder.embed_documents(&documents)?;
        if embeddings.len() != ids.len() {
            return Err(VectorStoreError::UpsertError(format!(
                "embedder returned {} vectors for {} documents",
                embeddings.len(),
                ids.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimension(embedding.len())?;
        }
        let dimension = embeddings[0].len();
        if embeddings.iter().any(|e| e.len() != dimension) {
            return Err(VectorStoreError::UpsertError(
                "embedder returned vectors of differing dimension".to_string(),
            ));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (collection, id, document, metadata, embedding, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    metadata = excluded.metadata,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at",
            )?;

            for (((id, document), metadata), embedding) in ids
                .iter()
                .zip(documents.iter())
                .zip(metadatas.iter())
                .zip(embeddings.iter())
            {
                let metadata = serde_json::to_string(metadata)?;
                stmt.execute(params![
                    self.collection,
                    id,
                    document,
                    metadata,
                    encode_embedding(embedding),
                    now
                ])?;
            }
        }

        if self.dimension.is_none() {
            tx.execute(
                "UPDATE collections SET dimension = ?2 WHERE name = ?1",
                params![self.collection, dimension as i64],
            )?;
        }
        tx.commit()?;
        self.dimension = Some(dimension);

        debug!(collection = %self.collection, records = ids.len(), "upserted batch");
        Ok(())
    }

    fn query(&self, text: &str, limit: usize) -> Result<Vec<QueryMatch>, VectorStoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(text)?;
        self.check_dimension(query_vector.len())?;

        let mut stmt = self
            .conn
            .prepare("SELECT id, metadata, embedding FROM records WHERE collection = ?1")?;
        let rows = stmt.query_map(params![self.collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (id, metadata, blob) = row?;
            let embedding = decode_embedding(&blob, query_vector.len())?;
            matches.push(QueryMatch {
                id,
                metadata: serde_json::from_str(&metadata)?,
                distance: cosine_distance(&query_vector, &embedding),
            });
        }

        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(limit);
        Ok(matches)
    }
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(blob: &[u8], dimension: usize) -> Result<Vec<f32>, VectorStoreError> {
    if blob.len() != dimension * std::mem::size_of::<f32>() {
        return Err(VectorStoreError::InvalidDimension {
            expected: dimension,
            actual: blob.len() / std::mem::size_of::<f32>(),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// `1 - cosine similarity`; a zero vector is treated as orthogonal to everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 1.0;
    }
    (1.0 - dot / denom) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedding::HashEmbedder;

    fn open(dir: &Path, dimension: usize) -> SqliteStore {
        SqliteStore::open(
            &dir.join("store.sqlite3"),
            "files",
            Box::new(HashEmbedder::new(dimension)),
        )
        .unwrap()
    }

    fn meta(path: &str) -> RecordMetadata {
        RecordMetadata {
            path: path.to_string(),
        }
    }

    #[test]
    fn test_new_collection_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), 32);
        assert_eq!(store.collection(), "files");
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.query("anything", 5).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_overwrites_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path(), 32);

        store
            .upsert(
                vec!["a".into(), "b".into()],
                vec!["alpha text".into(), "beta text".into()],
                vec![meta("a.txt"), meta("b.txt")],
            )
            .unwrap();
        store
            .upsert(
                vec!["a".into()],
                vec!["alpha rewritten".into()],
                vec![meta("a.txt")],
            )
            .unwrap();

        assert_eq!(store.count().unwrap(), 2);
        let document: String = store
            .conn
            .query_row(
                "SELECT document FROM records WHERE id = 'a'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(document, "alpha rewritten");
    }

    #[test]
    fn test_upsert_rejects_mismatched_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path(), 32);
        let result = store.upsert(vec!["a".into()], vec![], vec![meta("a.txt")]);
        assert!(matches!(result, Err(VectorStoreError::UpsertError(_))));
    }

    #[test]
    fn test_query_ranks_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path(), 256);
        store
            .upsert(
                vec!["1".into(), "2".into(), "3".into()],
                vec![
                    "database connection pool settings".into(),
                    "render triangles with shaders".into(),
                    "connection retry for the database".into(),
                ],
                vec![meta("db/pool.rs"), meta("gfx/render.rs"), meta("db/retry.rs")],
            )
            .unwrap();

        let matches = store.query("database connection", 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].distance <= matches[1].distance);
        let paths: Vec<&str> = matches.iter().map(|m| m.metadata.path.as_str()).collect();
        assert!(paths.contains(&"db/pool.rs"));
        assert!(paths.contains(&"db/retry.rs"));
    }

    #[test]
    fn test_exact_match_has_zero_distance() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path(), 64);
        store
            .upsert(
                vec!["x".into()],
                vec!["semantic vector search".into()],
                vec![meta("x.md")],
            )
            .unwrap();

        let matches = store.query("semantic vector search", 5).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].distance.abs() < 1e-5);
    }

    #[test]
    fn test_records_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(dir.path(), 32);
            store
                .upsert(vec!["a".into()], vec!["kept".into()], vec![meta("a.txt")])
                .unwrap();
        }
        let store = open(dir.path(), 32);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.query("kept", 1).unwrap()[0].metadata, meta("a.txt"));
    }

    #[test]
    fn test_reopen_with_other_embedder_fails() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(dir.path(), 32);
            store
                .upsert(vec!["a".into()], vec!["indexed".into()], vec![meta("a.txt")])
                .unwrap();
        }

        let result = SqliteStore::open(
            &dir.path().join("store.sqlite3"),
            "files",
            Box::new(HashEmbedder::new(64)),
        );
        assert!(matches!(
            result,
            Err(VectorStoreError::IncompatibleCollection { .. })
        ));
    }

    #[test]
    fn test_empty_collection_adopts_new_embedder() {
        let dir = tempfile::tempdir().unwrap();
        drop(open(dir.path(), 32));

        let mut store = open(dir.path(), 64);
        store
            .upsert(vec!["a".into()], vec!["after switch".into()], vec![meta("a.txt")])
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
        drop(store);

        let embedder: String = open(dir.path(), 64)
            .conn
            .query_row(
                "SELECT embedder FROM collections WHERE name = 'files'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(embedder, "hash:64");
    }

    #[test]
    fn test_collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");
        let mut first =
            SqliteStore::open(&path, "first", Box::new(HashEmbedder::new(16))).unwrap();
        first
            .upsert(vec!["a".into()], vec!["one".into()], vec![meta("a.txt")])
            .unwrap();

        let second = SqliteStore::open(&path, "second", Box::new(HashEmbedder::new(16))).unwrap();
        assert_eq!(first.count().unwrap(), 1);
        assert_eq!(second.count().unwrap(), 0);
    }

    #[test]
    fn test_embedding_blob_round_trip() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&v), 3).unwrap(), v);
        assert!(decode_embedding(&encode_embedding(&v), 4).is_err());
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }
}
