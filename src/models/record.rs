use serde::{Deserialize, Serialize};

use crate::utils::file::record_id;

/// Metadata stored alongside every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Path relative to the indexed root, `/`-separated
    pub path: String,
}

/// A file that passed every walk filter, ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
}

impl IndexedRecord {
    /// Build a record whose id is derived from `relative_path` alone.
    pub fn new(relative_path: String, text: String) -> Self {
        Self {
            id: record_id(&relative_path),
            text,
            metadata: RecordMetadata {
                path: relative_path,
            },
        }
    }

    pub fn path(&self) -> &str {
        &self.metadata.path
    }
}
