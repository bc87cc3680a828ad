pub mod database;
pub mod query;
pub mod reference;
pub mod results;
pub mod snapshot;
pub mod transaction;
pub mod write_batch;

pub use database::Docstore;
pub use query::{Query, QueryDefinition};
pub use reference::{CollectionReference, DocumentReference};
pub use results::{MoreResults, ResultPage, ResultSequence};
pub use snapshot::DocumentSnapshot;
pub use transaction::{ReadResult, ReadSnapshot, ReadTarget};
pub use write_batch::WriteBatch;
