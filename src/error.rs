use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocstoreErrorCode {
    InvalidArgument,
    ClosedTransaction,
    NotConnected,
    NotFound,
    Unavailable,
    Internal,
}

impl DocstoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocstoreErrorCode::InvalidArgument => "docstore/invalid-argument",
            DocstoreErrorCode::ClosedTransaction => "docstore/closed-transaction",
            DocstoreErrorCode::NotConnected => "docstore/not-connected",
            DocstoreErrorCode::NotFound => "docstore/not-found",
            DocstoreErrorCode::Unavailable => "docstore/unavailable",
            DocstoreErrorCode::Internal => "docstore/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct DocstoreError {
    pub code: DocstoreErrorCode,
    message: String,
}

impl DocstoreError {
    pub fn new(code: DocstoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for DocstoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl Error for DocstoreError {}

pub type DocstoreResult<T> = Result<T, DocstoreError>;

pub fn invalid_argument(message: impl Into<String>) -> DocstoreError {
    DocstoreError::new(DocstoreErrorCode::InvalidArgument, message)
}

pub fn closed_transaction(message: impl Into<String>) -> DocstoreError {
    DocstoreError::new(DocstoreErrorCode::ClosedTransaction, message)
}

pub fn not_connected() -> DocstoreError {
    DocstoreError::new(
        DocstoreErrorCode::NotConnected,
        "Docstore handle is not associated with a live data service",
    )
}

pub fn not_found(message: impl Into<String>) -> DocstoreError {
    DocstoreError::new(DocstoreErrorCode::NotFound, message)
}

pub fn unavailable(message: impl Into<String>) -> DocstoreError {
    DocstoreError::new(DocstoreErrorCode::Unavailable, message)
}

pub fn internal_error(message: impl Into<String>) -> DocstoreError {
    DocstoreError::new(DocstoreErrorCode::Internal, message)
}
