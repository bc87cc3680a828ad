use crate::error::{invalid_argument, DocstoreResult};
use crate::model::{Cursor, DocumentKey, ResourcePath, TransactionId};

use super::results::ResultSequence;
use super::Docstore;

/// A query targeting a single collection.
///
/// Queries support a result limit and cursor-based resumption. Richer
/// operators (filters, ordering, offsets) are left to the backing service's
/// defaults for now.
#[derive(Clone, Debug)]
pub struct Query {
    docstore: Docstore,
    definition: QueryDefinition,
}

impl Query {
    pub(crate) fn new(docstore: Docstore, collection_path: ResourcePath) -> DocstoreResult<Self> {
        if !collection_path.is_collection_path() {
            return Err(invalid_argument(
                "Queries must reference a collection (odd number of path segments)",
            ));
        }
        Ok(Self {
            docstore,
            definition: QueryDefinition {
                collection_path,
                limit: None,
                start_cursor: None,
            },
        })
    }

    /// Returns the Docstore instance that created this query.
    pub fn docstore(&self) -> &Docstore {
        &self.docstore
    }

    /// Returns the full resource path to the targeted collection.
    pub fn collection_path(&self) -> &ResourcePath {
        &self.definition.collection_path
    }

    /// The identifier (last segment) of the targeted collection.
    pub fn collection_id(&self) -> &str {
        self.definition
            .collection_path
            .last_segment()
            .expect("Collection path always ends with an identifier")
    }

    /// Returns a copy of this query capped at `limit` results.
    pub fn limit(&self, limit: i32) -> DocstoreResult<Self> {
        if limit <= 0 {
            return Err(invalid_argument("Query limit must be positive"));
        }
        let mut query = self.clone();
        query.definition.limit = Some(limit);
        Ok(query)
    }

    /// Returns a copy of this query resuming after `cursor`.
    pub fn start_after(&self, cursor: Cursor) -> Self {
        Self {
            docstore: self.docstore.clone(),
            definition: self.definition.with_start_cursor(cursor),
        }
    }

    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    /// Executes the query, returning the first page of results.
    pub async fn run(&self) -> DocstoreResult<ResultSequence> {
        self.run_with_transaction(None).await
    }

    pub(crate) async fn run_with_transaction(
        &self,
        transaction: Option<TransactionId>,
    ) -> DocstoreResult<ResultSequence> {
        let service = self.docstore.service()?;
        let page = service
            .run_query(&self.definition, transaction.as_ref())
            .await?;
        Ok(ResultSequence::new(
            self.docstore.clone(),
            self.definition.clone(),
            transaction,
            page,
        ))
    }
}

/// Immutable snapshot of what a query asks for.
///
/// `with_start_cursor` never mutates in place: pagination derives each next
/// request from the previous response without invalidating earlier pages.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryDefinition {
    pub(crate) collection_path: ResourcePath,
    pub(crate) limit: Option<i32>,
    pub(crate) start_cursor: Option<Cursor>,
}

impl QueryDefinition {
    pub fn collection_path(&self) -> &ResourcePath {
        &self.collection_path
    }

    pub fn limit(&self) -> Option<i32> {
        self.limit
    }

    pub fn start_cursor(&self) -> Option<&Cursor> {
        self.start_cursor.as_ref()
    }

    pub fn with_start_cursor(&self, cursor: Cursor) -> Self {
        Self {
            collection_path: self.collection_path.clone(),
            limit: self.limit,
            start_cursor: Some(cursor),
        }
    }

    pub(crate) fn matches_collection(&self, key: &DocumentKey) -> bool {
        key.collection_path() == self.collection_path
    }
}
