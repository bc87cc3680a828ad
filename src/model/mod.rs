mod cursor;
mod database_id;
mod document_key;
mod resource_path;
mod timestamp;

pub use cursor::{Cursor, TransactionId};
pub use database_id::{DatabaseId, DEFAULT_DATABASE_ID};
pub use document_key::DocumentKey;
pub use resource_path::ResourcePath;
pub use timestamp::Timestamp;
