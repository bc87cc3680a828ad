use std::fmt::{Debug, Formatter};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{invalid_argument, DocstoreResult};
use crate::value::DocValue;

/// Opaque resumption token marking a position within an ordered query
/// result stream.
///
/// The token bytes are produced by the backend and must be treated as
/// opaque. The optional ordering values are informational only (display and
/// equality); they carry no resumption semantics of their own. Cursors are
/// immutable once created.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    token: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    order_values: Vec<DocValue>,
}

impl Cursor {
    pub fn from_bytes(token: impl Into<Vec<u8>>) -> Self {
        Self {
            token: token.into(),
            order_values: Vec::new(),
        }
    }

    pub fn with_order_values(token: impl Into<Vec<u8>>, order_values: Vec<DocValue>) -> Self {
        Self {
            token: token.into(),
            order_values,
        }
    }

    pub fn from_base64(encoded: &str) -> DocstoreResult<Self> {
        let token = BASE64
            .decode(encoded)
            .map_err(|err| invalid_argument(format!("Invalid base64 cursor token: {err}")))?;
        Ok(Self::from_bytes(token))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.token
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.token)
    }

    pub fn order_values(&self) -> &[DocValue] {
        &self.order_values
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }
}

impl Debug for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.order_values.is_empty() {
            write!(f, "Cursor({})", self.to_base64())
        } else {
            write!(f, "Cursor({}, {:?})", self.to_base64(), self.order_values)
        }
    }
}

/// Opaque identifier for a server-side transaction.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    token: Vec<u8>,
}

impl TransactionId {
    pub fn from_bytes(token: impl Into<Vec<u8>>) -> Self {
        Self { token: token.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.token
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.token)
    }
}

impl Debug for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransactionId({})", self.to_base64())
    }
}
