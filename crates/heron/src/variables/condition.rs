//
// variables/condition.rs
//

use serde::Serialize;

use super::{Variable, LEVEL_CONDITION};
use crate::locality::Locality;

/// Level-88 condition name: a named set of values of its owning item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionName {
    name: String,
    value: String,
    definition: Locality,
}

impl ConditionName {
    pub fn new(name: impl Into<String>, value: impl Into<String>, definition: Locality) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            definition,
        }
    }
}

impl Variable for ConditionName {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> &Locality {
        &self.definition
    }

    fn level(&self) -> u8 {
        LEVEL_CONDITION
    }

    fn value(&self) -> Option<&str> {
        Some(self.value.as_str()).filter(|v| !v.is_empty())
    }

    fn accepts_child(&self, _level: u8) -> bool {
        false
    }
}
