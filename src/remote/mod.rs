pub mod service;

pub use service::{DataService, DataServiceArc, InMemoryDataService, TransactionOptions, WriteOperation};
