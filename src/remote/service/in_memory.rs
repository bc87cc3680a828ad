use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::query::QueryDefinition;
use crate::api::results::{MoreResults, ResultPage};
use crate::api::DocumentSnapshot;
use crate::error::{invalid_argument, not_found, DocstoreResult};
use crate::model::{Cursor, DocumentKey, Timestamp, TransactionId};
use crate::value::MapValue;

use super::{DataService, TransactionOptions, WriteOperation};

/// In-memory `DataService` used by tests and local development.
///
/// Documents are keyed by canonical path; cursors are the canonical path of
/// the document they follow. Beginning a transaction freezes a copy of the
/// store, so reads under that transaction observe a stable point in time.
/// RPC counters are exposed so tests can assert call counts.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDataService {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    documents: Mutex<BTreeMap<String, MapValue>>,
    transactions: Mutex<HashMap<Vec<u8>, BTreeMap<String, MapValue>>>,
    // 0 means unpaginated.
    page_size: AtomicUsize,
    transaction_counter: AtomicU64,
    query_calls: AtomicUsize,
    begin_calls: AtomicUsize,
    rollback_calls: AtomicUsize,
    last_start_cursor: Mutex<Option<Cursor>>,
    last_begin_read_time: Mutex<Option<Timestamp>>,
}

impl InMemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps every query response at `page_size` documents, forcing callers
    /// through cursor continuation.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.inner.page_size.store(page_size, Ordering::SeqCst);
        self
    }

    pub fn query_calls(&self) -> usize {
        self.inner.query_calls.load(Ordering::SeqCst)
    }

    pub fn begin_calls(&self) -> usize {
        self.inner.begin_calls.load(Ordering::SeqCst)
    }

    pub fn rollback_calls(&self) -> usize {
        self.inner.rollback_calls.load(Ordering::SeqCst)
    }

    /// Start cursor carried by the most recent query RPC, if any.
    pub fn last_start_cursor(&self) -> Option<Cursor> {
        self.inner.last_start_cursor.lock().unwrap().clone()
    }

    /// Read time carried by the most recent begin-transaction RPC, if any.
    pub fn last_begin_read_time(&self) -> Option<Timestamp> {
        *self.inner.last_begin_read_time.lock().unwrap()
    }

    fn view(
        &self,
        transaction: Option<&TransactionId>,
    ) -> DocstoreResult<BTreeMap<String, MapValue>> {
        match transaction {
            None => Ok(self.inner.documents.lock().unwrap().clone()),
            Some(id) => self
                .inner
                .transactions
                .lock()
                .unwrap()
                .get(id.as_bytes())
                .cloned()
                .ok_or_else(|| invalid_argument("Unknown transaction id")),
        }
    }

    fn apply_set(&self, key: DocumentKey, data: MapValue) -> DocstoreResult<()> {
        let mut store = self.inner.documents.lock().unwrap();
        store.insert(key.path().canonical_string(), data);
        Ok(())
    }

    fn apply_update(&self, key: DocumentKey, data: MapValue) -> DocstoreResult<()> {
        let mut store = self.inner.documents.lock().unwrap();
        let canonical = key.path().canonical_string();
        let current = store
            .get(&canonical)
            .cloned()
            .ok_or_else(|| not_found(format!("Document {} does not exist", canonical)))?;

        let mut fields = current.fields().clone();
        for (name, value) in data.fields() {
            fields.insert(name.clone(), value.clone());
        }
        store.insert(canonical, MapValue::new(fields));
        Ok(())
    }

    fn apply_delete(&self, key: DocumentKey) -> DocstoreResult<()> {
        let mut store = self.inner.documents.lock().unwrap();
        store.remove(&key.path().canonical_string());
        Ok(())
    }

    fn snapshot_from(view: &BTreeMap<String, MapValue>, key: &DocumentKey) -> DocumentSnapshot {
        let data = view.get(&key.path().canonical_string()).cloned();
        DocumentSnapshot::new(key.clone(), data, Some(Timestamp::now()))
    }
}

#[async_trait]
impl DataService for InMemoryDataService {
    async fn get_document(
        &self,
        key: &DocumentKey,
        transaction: Option<&TransactionId>,
    ) -> DocstoreResult<DocumentSnapshot> {
        let view = self.view(transaction)?;
        Ok(Self::snapshot_from(&view, key))
    }

    async fn batch_get_documents(
        &self,
        keys: &[DocumentKey],
        transaction: Option<&TransactionId>,
    ) -> DocstoreResult<Vec<DocumentSnapshot>> {
        let view = self.view(transaction)?;
        Ok(keys
            .iter()
            .map(|key| Self::snapshot_from(&view, key))
            .collect())
    }

    async fn run_query(
        &self,
        query: &QueryDefinition,
        transaction: Option<&TransactionId>,
    ) -> DocstoreResult<ResultPage> {
        self.inner.query_calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.last_start_cursor.lock().unwrap() = query.start_cursor().cloned();

        let view = self.view(transaction)?;
        let read_time = Timestamp::now();

        let mut matched: Vec<(String, MapValue)> = Vec::new();
        let mut preceding = 0usize;
        for (path, data) in view.iter() {
            let key = DocumentKey::from_string(path)?;
            if !query.matches_collection(&key) {
                continue;
            }
            if let Some(cursor) = query.start_cursor() {
                // The cursor token is the canonical path of the last
                // returned document; resume strictly after it.
                if path.as_bytes() <= cursor.as_bytes() {
                    preceding += 1;
                    continue;
                }
            }
            matched.push((path.clone(), data.clone()));
        }

        let mut more_results = MoreResults::NoMoreResults;
        if let Some(limit) = query.limit() {
            // The limit applies to the query as a whole, so a continuation
            // only gets whatever the earlier pages left of it.
            let remaining = (limit as usize).saturating_sub(preceding);
            if remaining == 0 {
                matched.clear();
            } else if matched.len() > remaining {
                matched.truncate(remaining);
                more_results = MoreResults::MoreAfterLimit;
            }
        }
        let page_size = self.inner.page_size.load(Ordering::SeqCst);
        if page_size > 0 && matched.len() > page_size {
            matched.truncate(page_size);
            more_results = MoreResults::NotFinished;
        }

        let entries: Vec<(DocumentSnapshot, Cursor)> = matched
            .into_iter()
            .map(|(path, data)| {
                let key = DocumentKey::from_string(&path)?;
                let snapshot = DocumentSnapshot::new(key, Some(data), Some(read_time));
                Ok((snapshot, Cursor::from_bytes(path.into_bytes())))
            })
            .collect::<DocstoreResult<_>>()?;

        let end_cursor = entries
            .last()
            .map(|(_, cursor)| cursor.clone())
            .or_else(|| query.start_cursor().cloned());

        Ok(ResultPage::new(entries, end_cursor, more_results))
    }

    async fn begin_transaction(
        &self,
        options: TransactionOptions,
    ) -> DocstoreResult<TransactionId> {
        self.inner.begin_calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.last_begin_read_time.lock().unwrap() = options.read_time;
        let serial = self.inner.transaction_counter.fetch_add(1, Ordering::SeqCst);
        let id = TransactionId::from_bytes(format!("txn-{serial}").into_bytes());

        // The store has no history, so a fixed read_time is approximated by
        // the freeze-at-begin view.
        let frozen = self.inner.documents.lock().unwrap().clone();
        self.inner
            .transactions
            .lock()
            .unwrap()
            .insert(id.as_bytes().to_vec(), frozen);
        Ok(id)
    }

    async fn rollback(&self, transaction: &TransactionId) -> DocstoreResult<()> {
        self.inner.rollback_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .transactions
            .lock()
            .unwrap()
            .remove(transaction.as_bytes());
        Ok(())
    }

    async fn set_document(&self, key: &DocumentKey, data: MapValue) -> DocstoreResult<()> {
        self.apply_set(key.clone(), data)
    }

    async fn update_document(&self, key: &DocumentKey, data: MapValue) -> DocstoreResult<()> {
        self.apply_update(key.clone(), data)
    }

    async fn delete_document(&self, key: &DocumentKey) -> DocstoreResult<()> {
        self.apply_delete(key.clone())
    }

    async fn commit(&self, writes: Vec<WriteOperation>) -> DocstoreResult<()> {
        for write in writes {
            match write {
                WriteOperation::Set { key, data } => self.apply_set(key, data)?,
                WriteOperation::Update { key, data } => self.apply_update(key, data)?,
                WriteOperation::Delete { key } => self.apply_delete(key)?,
            }
        }
        Ok(())
    }
}
