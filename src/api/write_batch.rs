use std::collections::BTreeMap;

use crate::error::{invalid_argument, DocstoreResult};
use crate::remote::service::WriteOperation;
use crate::value::{DocValue, MapValue};

use super::database::Docstore;
use super::reference::DocumentReference;

const MAX_BATCH_WRITES: usize = 500;

/// Aggregates write operations and commits them in one RPC.
#[derive(Clone, Debug)]
pub struct WriteBatch {
    docstore: Docstore,
    writes: Vec<WriteOperation>,
}

impl WriteBatch {
    pub(crate) fn new(docstore: Docstore) -> Self {
        Self {
            docstore,
            writes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Queues a set operation, replacing the document on commit.
    pub fn set(
        &mut self,
        reference: &DocumentReference,
        data: BTreeMap<String, DocValue>,
    ) -> DocstoreResult<&mut Self> {
        self.ensure_capacity()?;
        self.ensure_same_database(reference)?;
        self.writes.push(WriteOperation::Set {
            key: reference.key().clone(),
            data: MapValue::new(data),
        });
        Ok(self)
    }

    /// Queues an update merging the provided top-level fields.
    pub fn update(
        &mut self,
        reference: &DocumentReference,
        data: BTreeMap<String, DocValue>,
    ) -> DocstoreResult<&mut Self> {
        self.ensure_capacity()?;
        self.ensure_same_database(reference)?;
        if data.is_empty() {
            return Err(invalid_argument(
                "update requires at least one field/value pair",
            ));
        }
        self.writes.push(WriteOperation::Update {
            key: reference.key().clone(),
            data: MapValue::new(data),
        });
        Ok(self)
    }

    /// Queues a delete operation.
    pub fn delete(&mut self, reference: &DocumentReference) -> DocstoreResult<&mut Self> {
        self.ensure_capacity()?;
        self.ensure_same_database(reference)?;
        self.writes.push(WriteOperation::Delete {
            key: reference.key().clone(),
        });
        Ok(self)
    }

    /// Commits all queued writes atomically. Consumes the batch.
    pub async fn commit(self) -> DocstoreResult<()> {
        let service = self.docstore.service()?;
        service.commit(self.writes).await
    }

    fn ensure_same_database(&self, reference: &DocumentReference) -> DocstoreResult<()> {
        if self.docstore.database_id() != reference.docstore().database_id() {
            return Err(invalid_argument(
                "All WriteBatch operations must target the same database",
            ));
        }
        Ok(())
    }

    fn ensure_capacity(&self) -> DocstoreResult<()> {
        if self.writes.len() >= MAX_BATCH_WRITES {
            return Err(invalid_argument(
                "WriteBatch cannot contain more than 500 operations",
            ));
        }
        Ok(())
    }
}
