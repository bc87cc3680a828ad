use std::collections::VecDeque;

use futures::stream::Stream;
use log::warn;

use crate::error::DocstoreResult;
use crate::model::{Cursor, TransactionId};

use super::query::QueryDefinition;
use super::snapshot::DocumentSnapshot;
use super::Docstore;

/// Terminal-state flag reported with every query response batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoreResults {
    /// The server truncated the batch; more results follow.
    NotFinished,
    /// The query limit was reached; more results exist beyond it.
    MoreAfterLimit,
    /// The supplied end cursor was reached; more results exist beyond it.
    MoreAfterCursor,
    /// The result stream is exhausted.
    NoMoreResults,
}

/// One batch of documents returned by a single query RPC.
///
/// Documents are stored paired with their cursors, so the per-document
/// cursor list always has the same length as the document list.
#[derive(Clone, Debug)]
pub struct ResultPage {
    entries: Vec<(DocumentSnapshot, Cursor)>,
    end_cursor: Option<Cursor>,
    more_results: MoreResults,
}

impl ResultPage {
    pub fn new(
        entries: Vec<(DocumentSnapshot, Cursor)>,
        end_cursor: Option<Cursor>,
        more_results: MoreResults,
    ) -> Self {
        Self {
            entries,
            end_cursor,
            more_results,
        }
    }

    pub fn entries(&self) -> &[(DocumentSnapshot, Cursor)] {
        &self.entries
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentSnapshot> {
        self.entries.iter().map(|(document, _)| document)
    }

    pub fn end_cursor(&self) -> Option<&Cursor> {
        self.end_cursor.as_ref()
    }

    pub fn more_results(&self) -> MoreResults {
        self.more_results
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One page of query results plus the ability to resume the query.
///
/// A sequence is a value: `fetch_next` never mutates `self`, it returns a
/// fresh sequence built from a new RPC response, so callers holding earlier
/// pages stay valid. Continuation is cursor-based rather than offset-based
/// because the backend guarantees stable ordering only relative to a cursor
/// under concurrent writes.
#[derive(Clone, Debug)]
pub struct ResultSequence {
    docstore: Docstore,
    definition: QueryDefinition,
    transaction: Option<TransactionId>,
    page: ResultPage,
}

impl ResultSequence {
    pub(crate) fn new(
        docstore: Docstore,
        definition: QueryDefinition,
        transaction: Option<TransactionId>,
        page: ResultPage,
    ) -> Self {
        Self {
            docstore,
            definition,
            transaction,
            page,
        }
    }

    /// The page this sequence currently holds.
    pub fn page(&self) -> &ResultPage {
        &self.page
    }

    /// Documents of the current page, in server response order.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentSnapshot> {
        self.page.documents()
    }

    /// The query definition this sequence was created from, including any
    /// start cursor applied by resumption.
    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    /// True unless the server reported the result stream as exhausted.
    pub fn has_more(&self) -> bool {
        self.page.more_results() != MoreResults::NoMoreResults
    }

    /// Returns the cursor paired with `document` within the current page.
    ///
    /// The lookup is positional over the current page only; documents from
    /// other pages yield `None`.
    pub fn cursor_for(&self, document: &DocumentSnapshot) -> Option<&Cursor> {
        self.page
            .entries()
            .iter()
            .find(|(candidate, _)| candidate == document)
            .map(|(_, cursor)| cursor)
    }

    /// Fetches the next page, returning a new sequence built from it.
    ///
    /// Returns `Ok(None)` when the stream is exhausted, and also when the
    /// server reported more results but recorded no end cursor: such a page
    /// cannot be resumed, so continuation stops rather than erroring.
    /// Exactly one query RPC is issued per call, with the stored definition's
    /// start cursor set to the current page's end cursor.
    pub async fn fetch_next(&self) -> DocstoreResult<Option<ResultSequence>> {
        if !self.has_more() {
            return Ok(None);
        }
        let end_cursor = match self.page.end_cursor() {
            Some(cursor) => cursor.clone(),
            None => {
                warn!(
                    "query on {} reported more results without an end cursor; stopping",
                    self.definition.collection_path()
                );
                return Ok(None);
            }
        };

        let definition = self.definition.with_start_cursor(end_cursor);
        let service = self.docstore.service()?;
        let page = service
            .run_query(&definition, self.transaction.as_ref())
            .await?;
        Ok(Some(ResultSequence::new(
            self.docstore.clone(),
            definition,
            self.transaction.clone(),
            page,
        )))
    }

    /// Consumes the sequence into a lazy stream over every document of every
    /// page, in arrival order.
    ///
    /// The stream is forward-only and non-restartable. Pages are fetched on
    /// demand: once the caller stops polling, no further RPCs are issued.
    /// An empty page whose state is still `NotFinished` triggers another
    /// fetch rather than terminating, since the server may return
    /// metadata-only batches.
    pub fn stream(self) -> impl Stream<Item = DocstoreResult<DocumentSnapshot>> {
        let pending: VecDeque<DocumentSnapshot> = self.page.documents().cloned().collect();
        futures::stream::try_unfold(
            (Some(self), pending),
            |(mut sequence, mut pending)| async move {
                loop {
                    if let Some(document) = pending.pop_front() {
                        return Ok(Some((document, (sequence, pending))));
                    }
                    let current = match sequence.take() {
                        Some(current) => current,
                        None => return Ok(None),
                    };
                    match current.fetch_next().await? {
                        Some(next) => {
                            pending.extend(next.page.documents().cloned());
                            sequence = Some(next);
                        }
                        None => return Ok(None),
                    }
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures_util::TryStreamExt;

    use super::*;
    use crate::error::{unavailable, DocstoreResult};
    use crate::model::{DatabaseId, DocumentKey, ResourcePath};
    use crate::remote::service::{DataService, TransactionOptions, WriteOperation};
    use crate::remote::InMemoryDataService;
    use crate::value::{DocValue, MapValue};

    async fn seed_users(service: &InMemoryDataService, count: usize) {
        for index in 0..count {
            let key = DocumentKey::from_string(&format!("users/user-{index:02}")).unwrap();
            let mut fields = BTreeMap::new();
            fields.insert("rank".to_string(), DocValue::from_integer(index as i64));
            service
                .set_document(&key, MapValue::new(fields))
                .await
                .unwrap();
        }
    }

    fn docstore_with(service: Arc<InMemoryDataService>) -> Docstore {
        Docstore::new(DatabaseId::default_database("project"), service)
    }

    #[tokio::test]
    async fn exhausted_page_fetches_nothing() {
        let service = Arc::new(InMemoryDataService::new());
        seed_users(&service, 2).await;
        let docstore = docstore_with(Arc::clone(&service));

        let sequence = docstore.collection("users").unwrap().query().run().await.unwrap();
        assert!(!sequence.has_more());
        let calls_before = service.query_calls();
        assert!(sequence.fetch_next().await.unwrap().is_none());
        assert_eq!(service.query_calls(), calls_before);
    }

    #[tokio::test]
    async fn fetch_next_resumes_at_end_cursor() {
        let service = Arc::new(InMemoryDataService::new().with_page_size(2));
        seed_users(&service, 5).await;
        let docstore = docstore_with(Arc::clone(&service));

        let first = docstore.collection("users").unwrap().query().run().await.unwrap();
        assert_eq!(first.page().len(), 2);
        assert!(first.has_more());
        let end_cursor = first.page().end_cursor().cloned().unwrap();

        let calls_before = service.query_calls();
        let second = first.fetch_next().await.unwrap().unwrap();
        assert_eq!(service.query_calls(), calls_before + 1);
        assert_eq!(service.last_start_cursor(), Some(end_cursor.clone()));
        assert_eq!(second.definition().start_cursor(), Some(&end_cursor));

        // The original sequence is untouched.
        assert_eq!(first.page().len(), 2);
        assert!(first.has_more());
    }

    #[tokio::test]
    async fn stream_concatenates_pages_in_order() {
        let service = Arc::new(InMemoryDataService::new().with_page_size(2));
        seed_users(&service, 5).await;
        let docstore = docstore_with(Arc::clone(&service));

        let sequence = docstore.collection("users").unwrap().query().run().await.unwrap();
        let documents: Vec<DocumentSnapshot> = sequence.stream().try_collect().await.unwrap();
        let ids: Vec<&str> = documents.iter().map(|doc| doc.id()).collect();
        assert_eq!(
            ids,
            vec!["user-00", "user-01", "user-02", "user-03", "user-04"]
        );
    }

    #[tokio::test]
    async fn cursor_for_matches_positionally() {
        let service = Arc::new(InMemoryDataService::new());
        seed_users(&service, 3).await;
        let docstore = docstore_with(Arc::clone(&service));

        let sequence = docstore.collection("users").unwrap().query().run().await.unwrap();
        let documents: Vec<DocumentSnapshot> = sequence.documents().cloned().collect();
        assert_eq!(documents.len(), 3);

        let cursor = sequence.cursor_for(&documents[1]).unwrap();
        assert_eq!(cursor, &sequence.page().entries()[1].1);

        let foreign_key = DocumentKey::from_string("users/absent").unwrap();
        let foreign = DocumentSnapshot::new(foreign_key, None, None);
        assert!(sequence.cursor_for(&foreign).is_none());
    }

    /// Service that replays a fixed script of pages, one per query RPC.
    #[derive(Debug)]
    struct ScriptedService {
        pages: std::sync::Mutex<VecDeque<ResultPage>>,
    }

    impl ScriptedService {
        fn new(pages: Vec<ResultPage>) -> Self {
            Self {
                pages: std::sync::Mutex::new(pages.into()),
            }
        }
    }

    #[async_trait]
    impl DataService for ScriptedService {
        async fn get_document(
            &self,
            key: &DocumentKey,
            _transaction: Option<&TransactionId>,
        ) -> DocstoreResult<DocumentSnapshot> {
            Ok(DocumentSnapshot::new(key.clone(), None, None))
        }

        async fn batch_get_documents(
            &self,
            _keys: &[DocumentKey],
            _transaction: Option<&TransactionId>,
        ) -> DocstoreResult<Vec<DocumentSnapshot>> {
            Ok(Vec::new())
        }

        async fn run_query(
            &self,
            _query: &QueryDefinition,
            _transaction: Option<&TransactionId>,
        ) -> DocstoreResult<ResultPage> {
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| unavailable("script exhausted"))
        }

        async fn begin_transaction(
            &self,
            _options: TransactionOptions,
        ) -> DocstoreResult<TransactionId> {
            Ok(TransactionId::from_bytes(b"txn".to_vec()))
        }

        async fn rollback(&self, _transaction: &TransactionId) -> DocstoreResult<()> {
            Ok(())
        }

        async fn set_document(&self, _key: &DocumentKey, _data: MapValue) -> DocstoreResult<()> {
            Ok(())
        }

        async fn update_document(&self, _key: &DocumentKey, _data: MapValue) -> DocstoreResult<()> {
            Ok(())
        }

        async fn delete_document(&self, _key: &DocumentKey) -> DocstoreResult<()> {
            Ok(())
        }

        async fn commit(&self, _writes: Vec<WriteOperation>) -> DocstoreResult<()> {
            Ok(())
        }
    }

    fn entry(path: &str) -> (DocumentSnapshot, Cursor) {
        let key = DocumentKey::from_string(path).unwrap();
        (
            DocumentSnapshot::new(key, None, None),
            Cursor::from_bytes(path.as_bytes().to_vec()),
        )
    }

    #[tokio::test]
    async fn empty_not_finished_page_continues() {
        // Metadata-only batches are legal: an empty page whose state is
        // still NotFinished must trigger another fetch, not termination.
        let pages = vec![
            ResultPage::new(
                vec![entry("users/a"), entry("users/b")],
                Some(Cursor::from_bytes(b"users/b".to_vec())),
                MoreResults::NotFinished,
            ),
            ResultPage::new(
                Vec::new(),
                Some(Cursor::from_bytes(b"users/b".to_vec())),
                MoreResults::NotFinished,
            ),
            ResultPage::new(
                vec![entry("users/c")],
                Some(Cursor::from_bytes(b"users/c".to_vec())),
                MoreResults::NoMoreResults,
            ),
        ];
        let docstore = Docstore::new(
            DatabaseId::default_database("project"),
            Arc::new(ScriptedService::new(pages)),
        );

        let sequence = docstore.collection("users").unwrap().query().run().await.unwrap();
        let documents: Vec<DocumentSnapshot> = sequence.stream().try_collect().await.unwrap();
        let ids: Vec<&str> = documents.iter().map(|doc| doc.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    /// Service whose pages claim more results but never carry an end cursor.
    #[derive(Debug)]
    struct CursorlessService;

    #[async_trait]
    impl DataService for CursorlessService {
        async fn get_document(
            &self,
            key: &DocumentKey,
            _transaction: Option<&TransactionId>,
        ) -> DocstoreResult<DocumentSnapshot> {
            Ok(DocumentSnapshot::new(key.clone(), None, None))
        }

        async fn batch_get_documents(
            &self,
            _keys: &[DocumentKey],
            _transaction: Option<&TransactionId>,
        ) -> DocstoreResult<Vec<DocumentSnapshot>> {
            Ok(Vec::new())
        }

        async fn run_query(
            &self,
            _query: &QueryDefinition,
            _transaction: Option<&TransactionId>,
        ) -> DocstoreResult<ResultPage> {
            Ok(ResultPage::new(Vec::new(), None, MoreResults::NotFinished))
        }

        async fn begin_transaction(
            &self,
            _options: TransactionOptions,
        ) -> DocstoreResult<TransactionId> {
            Ok(TransactionId::from_bytes(b"txn".to_vec()))
        }

        async fn rollback(&self, _transaction: &TransactionId) -> DocstoreResult<()> {
            Ok(())
        }

        async fn set_document(&self, _key: &DocumentKey, _data: MapValue) -> DocstoreResult<()> {
            Ok(())
        }

        async fn update_document(&self, _key: &DocumentKey, _data: MapValue) -> DocstoreResult<()> {
            Ok(())
        }

        async fn delete_document(&self, _key: &DocumentKey) -> DocstoreResult<()> {
            Ok(())
        }

        async fn commit(&self, _writes: Vec<WriteOperation>) -> DocstoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn missing_end_cursor_stops_without_error() {
        let docstore = Docstore::new(
            DatabaseId::default_database("project"),
            Arc::new(CursorlessService),
        );
        let sequence = docstore.collection("users").unwrap().query().run().await.unwrap();
        assert!(sequence.has_more());
        assert!(sequence.fetch_next().await.unwrap().is_none());

        let documents: Vec<DocumentSnapshot> =
            sequence.stream().try_collect().await.unwrap();
        assert!(documents.is_empty());
    }

    /// Service that fails every query with a transport error.
    #[derive(Debug)]
    struct FailingService;

    #[async_trait]
    impl DataService for FailingService {
        async fn get_document(
            &self,
            _key: &DocumentKey,
            _transaction: Option<&TransactionId>,
        ) -> DocstoreResult<DocumentSnapshot> {
            Err(unavailable("connection reset"))
        }

        async fn batch_get_documents(
            &self,
            _keys: &[DocumentKey],
            _transaction: Option<&TransactionId>,
        ) -> DocstoreResult<Vec<DocumentSnapshot>> {
            Err(unavailable("connection reset"))
        }

        async fn run_query(
            &self,
            _query: &QueryDefinition,
            _transaction: Option<&TransactionId>,
        ) -> DocstoreResult<ResultPage> {
            Err(unavailable("connection reset"))
        }

        async fn begin_transaction(
            &self,
            _options: TransactionOptions,
        ) -> DocstoreResult<TransactionId> {
            Err(unavailable("connection reset"))
        }

        async fn rollback(&self, _transaction: &TransactionId) -> DocstoreResult<()> {
            Err(unavailable("connection reset"))
        }

        async fn set_document(&self, _key: &DocumentKey, _data: MapValue) -> DocstoreResult<()> {
            Err(unavailable("connection reset"))
        }

        async fn update_document(&self, _key: &DocumentKey, _data: MapValue) -> DocstoreResult<()> {
            Err(unavailable("connection reset"))
        }

        async fn delete_document(&self, _key: &DocumentKey) -> DocstoreResult<()> {
            Err(unavailable("connection reset"))
        }

        async fn commit(&self, _writes: Vec<WriteOperation>) -> DocstoreResult<()> {
            Err(unavailable("connection reset"))
        }
    }

    #[tokio::test]
    async fn transport_error_propagates_from_fetch_next() {
        let docstore = Docstore::new(
            DatabaseId::default_database("project"),
            Arc::new(FailingService),
        );
        let path = ResourcePath::from_string("users").unwrap();
        let definition = QueryDefinition {
            collection_path: path,
            limit: None,
            start_cursor: None,
        };
        let page = ResultPage::new(
            Vec::new(),
            Some(Cursor::from_bytes(b"pos".to_vec())),
            MoreResults::NotFinished,
        );
        let sequence = ResultSequence::new(docstore, definition, None, page);
        let err = sequence.fetch_next().await.unwrap_err();
        assert_eq!(err.code_str(), "docstore/unavailable");
    }
}
