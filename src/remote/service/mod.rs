use std::sync::Arc;

use async_trait::async_trait;

use crate::api::query::QueryDefinition;
use crate::api::results::ResultPage;
use crate::api::DocumentSnapshot;
use crate::error::DocstoreResult;
use crate::model::{DocumentKey, Timestamp, TransactionId};
use crate::value::MapValue;

pub mod in_memory;

/// Options for beginning a read-only transaction.
///
/// With no `read_time` the transaction is pinned at the server's current
/// time; otherwise at the requested fixed time.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransactionOptions {
    pub read_time: Option<Timestamp>,
}

#[derive(Clone, Debug)]
pub enum WriteOperation {
    Set { key: DocumentKey, data: MapValue },
    Update { key: DocumentKey, data: MapValue },
    Delete { key: DocumentKey },
}

/// The RPC surface this SDK is built over.
///
/// Implementations own the wire protocol, serialization and retry policy.
/// Failures must surface as `docstore/unavailable` errors; this layer passes
/// them through without retrying or masking. Every method is one
/// self-contained RPC, so a shared handle tolerates concurrent use from
/// independent sequences and snapshots.
#[async_trait]
pub trait DataService: Send + Sync + std::fmt::Debug + 'static {
    async fn get_document(
        &self,
        key: &DocumentKey,
        transaction: Option<&TransactionId>,
    ) -> DocstoreResult<DocumentSnapshot>;

    async fn batch_get_documents(
        &self,
        keys: &[DocumentKey],
        transaction: Option<&TransactionId>,
    ) -> DocstoreResult<Vec<DocumentSnapshot>>;

    async fn run_query(
        &self,
        query: &QueryDefinition,
        transaction: Option<&TransactionId>,
    ) -> DocstoreResult<ResultPage>;

    async fn begin_transaction(
        &self,
        options: TransactionOptions,
    ) -> DocstoreResult<TransactionId>;

    async fn rollback(&self, transaction: &TransactionId) -> DocstoreResult<()>;

    async fn set_document(&self, key: &DocumentKey, data: MapValue) -> DocstoreResult<()>;

    async fn update_document(&self, key: &DocumentKey, data: MapValue) -> DocstoreResult<()>;

    async fn delete_document(&self, key: &DocumentKey) -> DocstoreResult<()>;

    async fn commit(&self, writes: Vec<WriteOperation>) -> DocstoreResult<()>;
}

pub type DataServiceArc = Arc<dyn DataService>;

pub use in_memory::InMemoryDataService;
