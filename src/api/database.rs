use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::error::{not_connected, DocstoreResult};
use crate::model::{DatabaseId, ResourcePath, Timestamp};
use crate::remote::service::DataService;

use super::reference::{CollectionReference, DocumentReference};
use super::transaction::ReadSnapshot;
use super::write_batch::WriteBatch;

/// Handle to one logical database.
///
/// Cheap to clone; all clones share the same service association. The
/// service handle is read-shared across every sequence, snapshot and batch
/// spawned from this database.
#[derive(Clone)]
pub struct Docstore {
    inner: Arc<DocstoreInner>,
}

struct DocstoreInner {
    database_id: DatabaseId,
    service: Option<Arc<dyn DataService>>,
}

impl Docstore {
    /// Creates a handle bound to a live data service.
    pub fn new(database_id: DatabaseId, service: Arc<dyn DataService>) -> Self {
        Self {
            inner: Arc::new(DocstoreInner {
                database_id,
                service: Some(service),
            }),
        }
    }

    /// Creates a handle with no service association.
    ///
    /// Reference construction and path validation work as usual; any call
    /// that would issue an RPC fails with `docstore/not-connected`.
    pub fn detached(database_id: DatabaseId) -> Self {
        Self {
            inner: Arc::new(DocstoreInner {
                database_id,
                service: None,
            }),
        }
    }

    /// The fully qualified database identifier (project + database name).
    pub fn database_id(&self) -> &DatabaseId {
        &self.inner.database_id
    }

    /// Returns the project identifier backing this database.
    pub fn project_id(&self) -> &str {
        self.inner.database_id.project_id()
    }

    /// Returns the logical database name (usually `"(default)"`).
    pub fn database(&self) -> &str {
        self.inner.database_id.database()
    }

    pub(crate) fn service(&self) -> DocstoreResult<Arc<dyn DataService>> {
        self.inner.service.clone().ok_or_else(not_connected)
    }

    /// Creates a `CollectionReference` pointing at `path`.
    ///
    /// The path is interpreted relative to the database root using forward
    /// slashes to separate segments (e.g. `"users/mike/messages"`).
    pub fn collection(&self, path: &str) -> DocstoreResult<CollectionReference> {
        let resource = ResourcePath::from_string(path)?;
        CollectionReference::new(self.clone(), resource)
    }

    /// Creates a `DocumentReference` pointing at `path`.
    ///
    /// The path must contain an even number of segments (collection/doc pairs).
    pub fn doc(&self, path: &str) -> DocstoreResult<DocumentReference> {
        let resource = ResourcePath::from_string(path)?;
        DocumentReference::new(self.clone(), resource)
    }

    /// Starts an empty write batch scoped to this database.
    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.clone())
    }

    /// Opens a read-only snapshot pinned at the server's current time.
    ///
    /// The snapshot acquires its transaction lazily on the first read.
    pub fn read_snapshot(&self) -> ReadSnapshot {
        ReadSnapshot::new(self.clone(), None)
    }

    /// Opens a read-only snapshot pinned at `read_time`.
    pub fn read_snapshot_at(&self, read_time: Timestamp) -> ReadSnapshot {
        ReadSnapshot::new(self.clone(), Some(read_time))
    }
}

impl Debug for Docstore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Docstore")
            .field("database_id", &self.inner.database_id)
            .field("connected", &self.inner.service.is_some())
            .finish()
    }
}
