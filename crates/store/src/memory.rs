use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use snowdex_contracts::{Document, FilterCriterion};

use crate::{DocumentStore, StoreError};

/// In-process table set with the same filter semantics as the DynamoDB store.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    tables: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: &str, documents: Vec<Document>) -> Self {
        let store = Self::new();
        store.replace_table(table, documents);
        store
    }

    pub fn replace_table(&self, table: &str, documents: Vec<Document>) {
        let mut tables = match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tables.insert(table.to_string(), documents);
    }

    fn read_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&[Document]) -> T,
    ) -> Result<T, StoreError> {
        let tables = match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tables
            .get(table)
            .map(|documents| f(documents.as_slice()))
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn scan_count(&self, table: &str) -> Result<u64, StoreError> {
        self.read_table(table, |documents| documents.len() as u64)
    }

    async fn scan_all(&self, table: &str) -> Result<Vec<Document>, StoreError> {
        self.read_table(table, |documents| documents.to_vec())
    }

    async fn scan_filtered(
        &self,
        table: &str,
        filter: &FilterCriterion,
    ) -> Result<Vec<Document>, StoreError> {
        self.read_table(table, |documents| {
            documents
                .iter()
                .filter(|document| filter.matches(document))
                .cloned()
                .collect::<Vec<_>>()
        })
    }
}
