//
// variables/mod.rs
//
// Data-item model: the declarations a program's DATA DIVISION introduces
//

pub mod condition;
pub mod independent;
pub mod structure;

pub use condition::ConditionName;
pub use independent::IndependentDataItem;
pub use structure::{ElementaryItem, GroupItem};

use serde::Serialize;

use crate::locality::Locality;

/// Level number of an independent (non-structured) item
pub const LEVEL_INDEPENDENT: u8 = 77;
/// Level number of a condition name
pub const LEVEL_CONDITION: u8 = 88;
/// Level number of a RENAMES item
pub const LEVEL_RENAMES: u8 = 66;

/// Word used for items that cannot be referenced by name
pub const FILLER: &str = "FILLER";

/// Common view over every kind of data item
pub trait Variable {
    fn name(&self) -> &str;

    /// Where the item is declared
    fn definition(&self) -> &Locality;

    fn level(&self) -> u8;

    /// Whether the item is a group that structures subordinate items
    fn is_structure(&self) -> bool {
        false
    }

    fn pic_clause(&self) -> Option<&str> {
        None
    }

    fn value(&self) -> Option<&str> {
        None
    }

    /// Whether a subordinate item with `level` may be declared under this one
    fn accepts_child(&self, level: u8) -> bool;

    /// FILLER and unnamed items take space but cannot be referenced
    fn is_referable(&self) -> bool {
        let name = self.name();
        !name.is_empty() && !name.eq_ignore_ascii_case(FILLER)
    }
}

/// A declared data item of one of the supported kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VariableKind {
    Independent(IndependentDataItem),
    Group(GroupItem),
    Elementary(ElementaryItem),
    Condition(ConditionName),
}

impl VariableKind {
    /// Classify a declaration by its level number and clauses.
    ///
    /// Level 77 is independent, 88 a condition name, 01-49 a group when it has
    /// no PIC clause and elementary otherwise. Level 66 is kept as an
    /// elementary item without a picture.
    pub fn classify(
        level: u8,
        name: impl Into<String>,
        pic: Option<String>,
        value: Option<String>,
        definition: Locality,
    ) -> Self {
        let name = name.into();
        match level {
            LEVEL_INDEPENDENT => Self::Independent(IndependentDataItem::new(
                name,
                pic.unwrap_or_default(),
                value.unwrap_or_default(),
                definition,
            )),
            LEVEL_CONDITION => {
                Self::Condition(ConditionName::new(name, value.unwrap_or_default(), definition))
            }
            LEVEL_RENAMES => {
                Self::Elementary(ElementaryItem::new(level, name, None, None, definition))
            }
            _ => match pic {
                Some(pic) => {
                    Self::Elementary(ElementaryItem::new(level, name, Some(pic), value, definition))
                }
                None => Self::Group(GroupItem::new(level, name, definition)),
            },
        }
    }

    pub fn as_variable(&self) -> &dyn Variable {
        match self {
            Self::Independent(v) => v,
            Self::Group(v) => v,
            Self::Elementary(v) => v,
            Self::Condition(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> Locality {
        Locality::point("file:///PROG.cbl", 3, 7)
    }

    #[test]
    fn test_classify_by_level_and_pic() {
        assert!(matches!(
            VariableKind::classify(77, "WS-FLAG", Some("9".into()), Some("0".into()), here()),
            VariableKind::Independent(_)
        ));
        assert!(matches!(
            VariableKind::classify(1, "WS-REC", None, None, here()),
            VariableKind::Group(_)
        ));
        assert!(matches!(
            VariableKind::classify(5, "WS-ID", Some("9(5)".into()), None, here()),
            VariableKind::Elementary(_)
        ));
        assert!(matches!(
            VariableKind::classify(88, "IS-ON", None, Some("1".into()), here()),
            VariableKind::Condition(_)
        ));
    }

    #[test]
    fn test_filler_is_not_referable() {
        let filler = VariableKind::classify(5, "FILLER", Some("X".into()), None, here());
        assert!(!filler.as_variable().is_referable());
        let unnamed = VariableKind::classify(5, "", Some("X".into()), None, here());
        assert!(!unnamed.as_variable().is_referable());
        let named = VariableKind::classify(5, "WS-A", Some("X".into()), None, here());
        assert!(named.as_variable().is_referable());
    }

    #[test]
    fn test_accepts_child() {
        let group = VariableKind::classify(1, "G", None, None, here());
        let elementary = VariableKind::classify(5, "E", Some("X".into()), None, here());
        let independent = VariableKind::classify(77, "I", Some("9".into()), None, here());
        let condition = VariableKind::classify(88, "C", None, Some("1".into()), here());

        assert!(group.as_variable().accepts_child(5));
        assert!(group.as_variable().accepts_child(88));
        assert!(!elementary.as_variable().accepts_child(10));
        assert!(elementary.as_variable().accepts_child(88));
        assert!(!independent.as_variable().accepts_child(88));
        assert!(!condition.as_variable().accepts_child(88));
    }
}
