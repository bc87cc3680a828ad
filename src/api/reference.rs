use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::error::{invalid_argument, DocstoreResult};
use crate::model::{DocumentKey, ResourcePath};
use crate::value::{DocValue, MapValue};

use super::database::Docstore;
use super::query::Query;
use super::snapshot::DocumentSnapshot;

#[derive(Clone, Debug)]
pub struct CollectionReference {
    docstore: Docstore,
    path: ResourcePath,
}

impl CollectionReference {
    pub(crate) fn new(docstore: Docstore, path: ResourcePath) -> DocstoreResult<Self> {
        if !path.is_collection_path() {
            return Err(invalid_argument(
                "Collection references must point to a collection (odd number of segments)",
            ));
        }
        Ok(Self { docstore, path })
    }

    /// Returns the Docstore instance that created this collection reference.
    pub fn docstore(&self) -> &Docstore {
        &self.docstore
    }

    /// The full resource path of the collection (e.g. `users/mike/messages`).
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// The last segment of the collection path.
    pub fn id(&self) -> &str {
        self.path
            .last_segment()
            .expect("Collection path always has id")
    }

    /// Returns the document that logically contains this collection, if any.
    pub fn parent(&self) -> Option<DocumentReference> {
        self.path.pop_last().and_then(|parent_path| {
            if !parent_path.is_document_path() {
                return None;
            }
            DocumentReference::new(self.docstore.clone(), parent_path).ok()
        })
    }

    /// Returns a reference to the document identified by `document_id`.
    ///
    /// When `document_id` is `None`, an auto-ID is generated.
    pub fn doc(&self, document_id: Option<&str>) -> DocstoreResult<DocumentReference> {
        let id = document_id
            .map(|id| id.to_string())
            .unwrap_or_else(generate_auto_id);
        if id.contains('/') {
            return Err(invalid_argument("Document ID cannot contain '/'."));
        }
        let path = self.path.child([id]);
        DocumentReference::new(self.docstore.clone(), path)
    }

    /// Creates a query that targets this collection.
    pub fn query(&self) -> Query {
        Query::new(self.docstore.clone(), self.path.clone())
            .expect("CollectionReference always points to a valid collection")
    }
}

impl Display for CollectionReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CollectionReference({})", self.path.canonical_string())
    }
}

#[derive(Clone, Debug)]
pub struct DocumentReference {
    docstore: Docstore,
    key: DocumentKey,
}

impl DocumentReference {
    pub(crate) fn new(docstore: Docstore, path: ResourcePath) -> DocstoreResult<Self> {
        let key = DocumentKey::from_path(path)?;
        Ok(Self { docstore, key })
    }

    /// Returns the Docstore instance that created this document reference.
    pub fn docstore(&self) -> &Docstore {
        &self.docstore
    }

    /// The document identifier (the last segment of its path).
    pub fn id(&self) -> &str {
        self.key.id()
    }

    /// The full resource path to the document.
    pub fn path(&self) -> &ResourcePath {
        self.key.path()
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// The parent collection containing this document.
    pub fn parent(&self) -> CollectionReference {
        CollectionReference::new(self.docstore.clone(), self.key.collection_path())
            .expect("Document parent path is always a collection")
    }

    /// Returns a reference to a subcollection rooted at this document.
    pub fn collection(&self, path: &str) -> DocstoreResult<CollectionReference> {
        let sub_path = ResourcePath::from_string(path)?;
        let full_path = self.key.path().child(sub_path.as_vec().clone());
        CollectionReference::new(self.docstore.clone(), full_path)
    }

    /// Fetches the current state of the document.
    pub async fn get(&self) -> DocstoreResult<DocumentSnapshot> {
        let service = self.docstore.service()?;
        service.get_document(&self.key, None).await
    }

    /// Writes `data`, replacing the document if it exists.
    pub async fn set(&self, data: BTreeMap<String, DocValue>) -> DocstoreResult<()> {
        let service = self.docstore.service()?;
        service.set_document(&self.key, MapValue::new(data)).await
    }

    /// Merges the provided top-level fields into the existing document.
    pub async fn update(&self, data: BTreeMap<String, DocValue>) -> DocstoreResult<()> {
        if data.is_empty() {
            return Err(invalid_argument(
                "update requires at least one field/value pair",
            ));
        }
        let service = self.docstore.service()?;
        service.update_document(&self.key, MapValue::new(data)).await
    }

    /// Deletes the document. Deleting an absent document is not an error.
    pub async fn delete(&self) -> DocstoreResult<()> {
        let service = self.docstore.service()?;
        service.delete_document(&self.key).await
    }
}

impl Display for DocumentReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DocumentReference({})",
            self.key.path().canonical_string()
        )
    }
}

fn generate_auto_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(20)
        .collect()
}
