use serde::{Deserialize, Serialize};

use crate::value::DocValue;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    values: Vec<DocValue>,
}

impl ArrayValue {
    pub fn new(values: Vec<DocValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[DocValue] {
        &self.values
    }
}
