use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::DocValue;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    fields: BTreeMap<String, DocValue>,
}

impl MapValue {
    pub fn new(fields: BTreeMap<String, DocValue>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, DocValue> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&DocValue> {
        self.fields.get(field)
    }
}
