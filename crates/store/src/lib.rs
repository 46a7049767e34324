use async_trait::async_trait;
use snowdex_contracts::{Document, FilterCriterion};

mod dynamo;
mod memory;

pub use dynamo::{DynamoDocumentStore, DynamoStoreConfig};
pub use memory::MemoryDocumentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Timeout,
    UnknownTable(String),
    Backend(String),
    Decode(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Timeout => write!(f, "store operation timed out"),
            StoreError::UnknownTable(table) => write!(f, "unknown table {}", table),
            StoreError::Backend(message) => write!(f, "store backend error: {}", message),
            StoreError::Decode(message) => write!(f, "failed to decode stored item: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

/// Read-only scan access to a schemaless document table.
///
/// Implementations are shared across concurrent requests behind an `Arc`, so
/// every method takes `&self` and must be safe to call in parallel.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Number of documents in `table`, without transferring document bodies.
    async fn scan_count(&self, table: &str) -> Result<u64, StoreError>;

    async fn scan_all(&self, table: &str) -> Result<Vec<Document>, StoreError>;

    /// Documents of `table` that satisfy `filter`, evaluated by the store.
    async fn scan_filtered(
        &self,
        table: &str,
        filter: &FilterCriterion,
    ) -> Result<Vec<Document>, StoreError>;
}
