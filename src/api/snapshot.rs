use std::collections::BTreeMap;

use crate::error::DocstoreResult;
use crate::model::{DocumentKey, Timestamp};
use crate::value::{DocValue, MapValue};

use super::reference::DocumentReference;
use super::Docstore;

/// A single document as observed by one read.
///
/// Snapshots compare by value (key, data and read time), which is what the
/// positional cursor lookup in `ResultSequence` relies on.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    key: DocumentKey,
    data: Option<MapValue>,
    read_time: Option<Timestamp>,
}

impl DocumentSnapshot {
    pub fn new(key: DocumentKey, data: Option<MapValue>, read_time: Option<Timestamp>) -> Self {
        Self {
            key,
            data,
            read_time,
        }
    }

    /// Returns whether the document exists on the backend.
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the decoded document fields if the snapshot contains data.
    pub fn data(&self) -> Option<&BTreeMap<String, DocValue>> {
        self.data.as_ref().map(|map| map.fields())
    }

    /// Returns a single top-level field, if present.
    pub fn field(&self, name: &str) -> Option<&DocValue> {
        self.data.as_ref().and_then(|map| map.get(name))
    }

    /// The server time at which this document state was observed, when the
    /// backend reported one.
    pub fn read_time(&self) -> Option<Timestamp> {
        self.read_time
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn document_key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn reference(&self, docstore: Docstore) -> DocstoreResult<DocumentReference> {
        DocumentReference::new(docstore, self.key.path().clone())
    }
}
