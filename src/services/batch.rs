use tracing::debug;

use crate::error::VectorStoreError;
use crate::models::{IndexedRecord, RecordMetadata};
use crate::services::vector_store::VectorStore;

/// Totals reported once the upserter is finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub batches: u64,
    pub records: u64,
}

/// Buffers records and hands them to the store `batch_size` at a time.
pub struct BatchUpserter<'a, S: VectorStore + ?Sized> {
    store: &'a mut S,
    batch_size: usize,
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<RecordMetadata>,
    summary: UpsertSummary,
}

impl<'a, S: VectorStore + ?Sized> BatchUpserter<'a, S> {
    pub fn new(store: &'a mut S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            ids: Vec::with_capacity(batch_size),
            documents: Vec::with_capacity(batch_size),
            metadatas: Vec::with_capacity(batch_size),
            summary: UpsertSummary::default(),
        }
    }

    /// Buffer a record, flushing when the buffer reaches the batch size.
    pub fn push(&mut self, record: IndexedRecord) -> Result<(), VectorStoreError> {
        self.ids.push(record.id);
        self.documents.push(record.text);
        self.metadatas.push(record.metadata);

        if self.ids.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush whatever is left and return the totals.
    pub fn finish(mut self) -> Result<UpsertSummary, VectorStoreError> {
        self.flush()?;
        Ok(self.summary)
    }

    pub fn pending(&self) -> usize {
        self.ids.len()
    }

    fn flush(&mut self) -> Result<(), VectorStoreError> {
        if self.ids.is_empty() {
            return Ok(());
        }

        let len = self.ids.len() as u64;
        self.store.upsert(
            std::mem::take(&mut self.ids),
            std::mem::take(&mut self.documents),
            std::mem::take(&mut self.metadatas),
        )?;

        self.summary.batches += 1;
        self.summary.records += len;
        debug!(
            records = len,
            batch = self.summary.batches,
            "flushed upsert batch"
        );
        Ok(())
    }
}
