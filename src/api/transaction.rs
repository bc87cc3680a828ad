use log::debug;

use crate::error::{closed_transaction, invalid_argument, DocstoreResult};
use crate::model::{DocumentKey, ResourcePath, Timestamp, TransactionId};
use crate::remote::service::TransactionOptions;

use super::query::Query;
use super::reference::{CollectionReference, DocumentReference};
use super::results::ResultSequence;
use super::snapshot::DocumentSnapshot;
use super::Docstore;

/// What a snapshot read is aimed at.
///
/// Path strings are classified by segment parity: an even count addresses a
/// document, an odd count a collection.
#[derive(Clone, Debug)]
pub enum ReadTarget {
    Path(String),
    Document(DocumentReference),
    Collection(CollectionReference),
    Query(Query),
}

impl From<&str> for ReadTarget {
    fn from(path: &str) -> Self {
        ReadTarget::Path(path.to_string())
    }
}

impl From<String> for ReadTarget {
    fn from(path: String) -> Self {
        ReadTarget::Path(path)
    }
}

impl From<DocumentReference> for ReadTarget {
    fn from(reference: DocumentReference) -> Self {
        ReadTarget::Document(reference)
    }
}

impl From<CollectionReference> for ReadTarget {
    fn from(reference: CollectionReference) -> Self {
        ReadTarget::Collection(reference)
    }
}

impl From<Query> for ReadTarget {
    fn from(query: Query) -> Self {
        ReadTarget::Query(query)
    }
}

/// Outcome of a polymorphic snapshot read.
#[derive(Debug)]
pub enum ReadResult {
    Document(DocumentSnapshot),
    Documents(ResultSequence),
}

impl ReadResult {
    pub fn document(self) -> Option<DocumentSnapshot> {
        match self {
            ReadResult::Document(snapshot) => Some(snapshot),
            ReadResult::Documents(_) => None,
        }
    }

    pub fn documents(self) -> Option<ResultSequence> {
        match self {
            ReadResult::Document(_) => None,
            ReadResult::Documents(sequence) => Some(sequence),
        }
    }
}

enum SnapshotState {
    Uninitialized,
    Active(TransactionId),
    Closed,
}

/// A read-only transaction: a consistency boundary guaranteeing all reads
/// within it observe the same logical point in time.
///
/// The transaction token is acquired lazily on the first read and reused for
/// every subsequent read; at most one begin RPC is ever issued. `rollback`
/// closes the snapshot, after which every read fails with
/// `docstore/closed-transaction`.
///
/// A snapshot is driven by a single caller; it is not meant to be shared
/// across threads.
pub struct ReadSnapshot {
    docstore: Docstore,
    read_time: Option<Timestamp>,
    state: SnapshotState,
}

impl ReadSnapshot {
    pub(crate) fn new(docstore: Docstore, read_time: Option<Timestamp>) -> Self {
        Self {
            docstore,
            read_time,
            state: SnapshotState::Uninitialized,
        }
    }

    /// The fixed read time this snapshot was opened at, if any.
    pub fn read_time(&self) -> Option<Timestamp> {
        self.read_time
    }

    /// The transaction token, once a read has pinned one.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        match &self.state {
            SnapshotState::Active(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SnapshotState::Closed)
    }

    /// Reads a document, a collection or a query under this snapshot.
    ///
    /// Document targets resolve to a single snapshot; collection and query
    /// targets resolve to a `ResultSequence` whose continuation pages run
    /// under the same transaction.
    pub async fn get<T: Into<ReadTarget>>(&mut self, target: T) -> DocstoreResult<ReadResult> {
        match target.into() {
            ReadTarget::Path(path) => {
                let resource = ResourcePath::from_string(&path)?;
                if resource.is_document_path() {
                    let key = DocumentKey::from_path(resource)?;
                    self.get_document_key(&key).await.map(ReadResult::Document)
                } else if resource.is_collection_path() {
                    let collection = CollectionReference::new(self.docstore.clone(), resource)?;
                    self.run_query(&collection.query())
                        .await
                        .map(ReadResult::Documents)
                } else {
                    Err(invalid_argument("Cannot read the database root"))
                }
            }
            ReadTarget::Document(reference) => self
                .get_document_key(reference.key())
                .await
                .map(ReadResult::Document),
            ReadTarget::Collection(collection) => self
                .run_query(&collection.query())
                .await
                .map(ReadResult::Documents),
            ReadTarget::Query(query) => {
                self.run_query(&query).await.map(ReadResult::Documents)
            }
        }
    }

    /// Fetches several documents in one RPC, all under the snapshot's
    /// transaction. Because the batch travels as a single round trip, the
    /// result is an eager `Vec` rather than a lazy sequence.
    pub async fn get_all<I, S>(&mut self, paths: I) -> DocstoreResult<Vec<DocumentSnapshot>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys = Vec::new();
        for path in paths {
            keys.push(DocumentKey::from_string(path.as_ref())?);
        }
        let transaction = self.ensure_transaction_id().await?;
        let service = self.docstore.service()?;
        service.batch_get_documents(&keys, Some(&transaction)).await
    }

    /// Closes the snapshot.
    ///
    /// If no read ever pinned a transaction there is nothing to roll back
    /// and no RPC is issued. Rolling back twice fails with
    /// `docstore/closed-transaction`.
    pub async fn rollback(&mut self) -> DocstoreResult<()> {
        match std::mem::replace(&mut self.state, SnapshotState::Closed) {
            SnapshotState::Closed => Err(closed_transaction("Snapshot already rolled back")),
            SnapshotState::Uninitialized => Ok(()),
            SnapshotState::Active(id) => {
                debug!("rolling back read-only transaction {:?}", id);
                let service = self.docstore.service()?;
                service.rollback(&id).await
            }
        }
    }

    async fn get_document_key(&mut self, key: &DocumentKey) -> DocstoreResult<DocumentSnapshot> {
        let transaction = self.ensure_transaction_id().await?;
        let service = self.docstore.service()?;
        service.get_document(key, Some(&transaction)).await
    }

    async fn run_query(&mut self, query: &Query) -> DocstoreResult<ResultSequence> {
        let transaction = self.ensure_transaction_id().await?;
        query.run_with_transaction(Some(transaction)).await
    }

    /// The single acquisition path for the snapshot's transaction token.
    ///
    /// The state machine makes the at-most-one-begin invariant mechanical:
    /// an active token is returned as-is, a closed snapshot refuses, and
    /// only the uninitialized state ever issues a begin RPC. A second
    /// transaction is never started under the same snapshot.
    async fn ensure_transaction_id(&mut self) -> DocstoreResult<TransactionId> {
        match &self.state {
            SnapshotState::Closed => {
                return Err(closed_transaction(
                    "Cannot read from a snapshot after rollback",
                ))
            }
            SnapshotState::Active(id) => return Ok(id.clone()),
            SnapshotState::Uninitialized => {}
        }

        let service = self.docstore.service()?;
        let options = TransactionOptions {
            read_time: self.read_time,
        };
        let id = service.begin_transaction(options).await?;
        debug!("began read-only transaction {:?}", id);
        self.state = SnapshotState::Active(id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::model::DatabaseId;
    use crate::remote::service::DataService;
    use crate::remote::InMemoryDataService;
    use crate::value::{DocValue, MapValue};

    async fn seed(service: &InMemoryDataService, path: &str, name: &str) {
        let key = DocumentKey::from_string(path).unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), DocValue::from_string(name));
        service
            .set_document(&key, MapValue::new(fields))
            .await
            .unwrap();
    }

    fn docstore_with(service: Arc<InMemoryDataService>) -> Docstore {
        Docstore::new(DatabaseId::default_database("project"), service)
    }

    #[tokio::test]
    async fn pins_exactly_one_transaction() {
        let service = Arc::new(InMemoryDataService::new());
        seed(&service, "users/mike", "Mike").await;
        seed(&service, "users/ada", "Ada").await;
        let docstore = docstore_with(Arc::clone(&service));

        let mut snapshot = docstore.read_snapshot();
        assert!(snapshot.transaction_id().is_none());

        snapshot.get("users/mike").await.unwrap();
        let first_id = snapshot.transaction_id().cloned().unwrap();
        snapshot.get("users/ada").await.unwrap();
        assert_eq!(snapshot.transaction_id(), Some(&first_id));
        assert_eq!(service.begin_calls(), 1);
    }

    #[tokio::test]
    async fn path_parity_selects_read_shape() {
        let service = Arc::new(InMemoryDataService::new());
        seed(&service, "users/mike", "Mike").await;
        seed(&service, "users/mike/messages/m1", "hello").await;
        let docstore = docstore_with(Arc::clone(&service));

        let mut snapshot = docstore.read_snapshot();

        let document = snapshot.get("users/mike").await.unwrap().document().unwrap();
        assert!(document.exists());

        let sequence = snapshot.get("users").await.unwrap().documents().unwrap();
        assert_eq!(sequence.page().len(), 1);

        let nested = snapshot
            .get("users/mike/messages")
            .await
            .unwrap()
            .documents()
            .unwrap();
        assert_eq!(nested.page().len(), 1);
    }

    #[tokio::test]
    async fn reads_fail_after_rollback() {
        let service = Arc::new(InMemoryDataService::new());
        seed(&service, "users/mike", "Mike").await;
        let docstore = docstore_with(Arc::clone(&service));

        let mut snapshot = docstore.read_snapshot();
        snapshot.get("users/mike").await.unwrap();
        snapshot.rollback().await.unwrap();
        assert!(snapshot.is_closed());
        assert_eq!(service.rollback_calls(), 1);

        let err = snapshot.get("users/mike").await.unwrap_err();
        assert_eq!(err.code_str(), "docstore/closed-transaction");
        let err = snapshot.get_all(["users/mike"]).await.unwrap_err();
        assert_eq!(err.code_str(), "docstore/closed-transaction");
        let err = snapshot.rollback().await.unwrap_err();
        assert_eq!(err.code_str(), "docstore/closed-transaction");
    }

    #[tokio::test]
    async fn rollback_without_reads_issues_no_rpc() {
        let service = Arc::new(InMemoryDataService::new());
        let docstore = docstore_with(Arc::clone(&service));

        let mut snapshot = docstore.read_snapshot();
        snapshot.rollback().await.unwrap();
        assert_eq!(service.begin_calls(), 0);
        assert_eq!(service.rollback_calls(), 0);
    }

    #[tokio::test]
    async fn get_all_shares_one_transaction() {
        let service = Arc::new(InMemoryDataService::new());
        seed(&service, "users/mike", "Mike").await;
        seed(&service, "users/ada", "Ada").await;
        let docstore = docstore_with(Arc::clone(&service));

        let mut snapshot = docstore.read_snapshot();
        let documents = snapshot
            .get_all(["users/mike", "users/ada", "users/ghost"])
            .await
            .unwrap();
        assert_eq!(documents.len(), 3);
        assert!(documents[0].exists());
        assert!(documents[1].exists());
        assert!(!documents[2].exists());
        assert_eq!(service.begin_calls(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_point_in_time() {
        let service = Arc::new(InMemoryDataService::new());
        seed(&service, "users/mike", "Mike").await;
        let docstore = docstore_with(Arc::clone(&service));

        let mut snapshot = docstore.read_snapshot();
        snapshot.get("users/mike").await.unwrap();

        // Write after the snapshot pinned its transaction.
        seed(&service, "users/new", "New").await;

        let sequence = snapshot.get("users").await.unwrap().documents().unwrap();
        let ids: Vec<&str> = sequence.documents().map(|doc| doc.id()).collect();
        assert_eq!(ids, vec!["mike"]);
    }

    #[tokio::test]
    async fn detached_handle_reads_are_not_connected() {
        let docstore = Docstore::detached(DatabaseId::default_database("project"));
        let mut snapshot = docstore.read_snapshot();
        let err = snapshot.get("users/mike").await.unwrap_err();
        assert_eq!(err.code_str(), "docstore/not-connected");
    }
}
