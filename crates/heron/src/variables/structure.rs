//
// variables/structure.rs
//
// Level 01-49 items: groups and the elementary items under them
//

use serde::Serialize;

use super::{Variable, LEVEL_CONDITION};
use crate::locality::Locality;

/// A record or sub-record without a picture; subordinates give it shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupItem {
    level: u8,
    name: String,
    definition: Locality,
}

impl GroupItem {
    pub fn new(level: u8, name: impl Into<String>, definition: Locality) -> Self {
        Self {
            level,
            name: name.into(),
            definition,
        }
    }
}

impl Variable for GroupItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> &Locality {
        &self.definition
    }

    fn level(&self) -> u8 {
        self.level
    }

    fn is_structure(&self) -> bool {
        true
    }

    fn accepts_child(&self, level: u8) -> bool {
        level == LEVEL_CONDITION || (level > self.level && level <= 49)
    }
}

/// An item with a picture. Only condition names may be declared under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementaryItem {
    level: u8,
    name: String,
    pic_clause: Option<String>,
    value: Option<String>,
    definition: Locality,
}

impl ElementaryItem {
    pub fn new(
        level: u8,
        name: impl Into<String>,
        pic_clause: Option<String>,
        value: Option<String>,
        definition: Locality,
    ) -> Self {
        Self {
            level,
            name: name.into(),
            pic_clause,
            value,
            definition,
        }
    }
}

impl Variable for ElementaryItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> &Locality {
        &self.definition
    }

    fn level(&self) -> u8 {
        self.level
    }

    fn pic_clause(&self) -> Option<&str> {
        self.pic_clause.as_deref()
    }

    fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    fn accepts_child(&self, level: u8) -> bool {
        level == LEVEL_CONDITION
    }
}
