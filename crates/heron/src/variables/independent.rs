//
// variables/independent.rs
//

use serde::Serialize;

use super::{Variable, VariableKind, LEVEL_INDEPENDENT};
use crate::locality::Locality;

/// A level-77 item: a name, a picture and an optional initial value, with no
/// subordinate structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndependentDataItem {
    name: String,
    pic_clause: String,
    value: String,
    definition: Locality,
}

impl IndependentDataItem {
    pub fn new(
        name: impl Into<String>,
        pic_clause: impl Into<String>,
        value: impl Into<String>,
        definition: Locality,
    ) -> Self {
        Self {
            name: name.into(),
            pic_clause: pic_clause.into(),
            value: value.into(),
            definition,
        }
    }

    /// The picture string as written, empty when absent
    pub fn pic(&self) -> &str {
        &self.pic_clause
    }

    /// The VALUE clause literal as written, empty when absent
    pub fn initial_value(&self) -> &str {
        &self.value
    }

    /// Always empty
    pub fn children(&self) -> &[VariableKind] {
        &[]
    }
}

impl Variable for IndependentDataItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> &Locality {
        &self.definition
    }

    fn level(&self) -> u8 {
        LEVEL_INDEPENDENT
    }

    fn pic_clause(&self) -> Option<&str> {
        Some(self.pic_clause.as_str()).filter(|p| !p.is_empty())
    }

    fn value(&self) -> Option<&str> {
        Some(self.value.as_str()).filter(|v| !v.is_empty())
    }

    fn accepts_child(&self, _level: u8) -> bool {
        false
    }
}
