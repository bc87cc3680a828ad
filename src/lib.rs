//! Client SDK for a document-database RPC API.
//!
//! The SDK exposes object-oriented bindings (collections, documents,
//! queries, batched writes) over a [`remote::DataService`] transport, with
//! cursor-based query pagination ([`api::ResultSequence`]) and read-only
//! point-in-time transactions ([`api::ReadSnapshot`]).
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docstore_rs_sdk::api::Docstore;
//! use docstore_rs_sdk::model::DatabaseId;
//! use docstore_rs_sdk::remote::InMemoryDataService;
//!
//! # async fn example() -> docstore_rs_sdk::error::DocstoreResult<()> {
//! let service = Arc::new(InMemoryDataService::new());
//! let docstore = Docstore::new(DatabaseId::default_database("project"), service);
//!
//! let users = docstore.collection("users")?;
//! let mut page = users.query().run().await?;
//! while let Some(next) = page.fetch_next().await? {
//!     page = next;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod model;
pub mod remote;
pub mod value;

pub use api::{
    CollectionReference, Docstore, DocumentReference, DocumentSnapshot, MoreResults, Query,
    ReadResult, ReadSnapshot, ReadTarget, ResultPage, ResultSequence, WriteBatch,
};
pub use error::{DocstoreError, DocstoreErrorCode, DocstoreResult};
pub use model::{Cursor, DatabaseId, DocumentKey, ResourcePath, Timestamp, TransactionId};
