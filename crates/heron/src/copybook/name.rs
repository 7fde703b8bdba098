//
// copybook/name.rs
//
// Copybook identity and resolved content
//

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// A copybook name as written in a directive, compared by its normalized form.
///
/// COBOL words are case-insensitive, so `copy "payroll"` and `COPY PAYROLL`
/// name the same copybook. Normalization trims whitespace, strips one pair of
/// surrounding quotes and upper-cases ASCII letters.
#[derive(Debug, Clone, Serialize)]
pub struct CopybookName {
    display: String,
    normalized: String,
}

impl CopybookName {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let unquoted = strip_quotes(trimmed);
        Self {
            display: unquoted.to_string(),
            normalized: unquoted.to_ascii_uppercase(),
        }
    }

    /// Spelling as it appeared in the source (quotes removed)
    pub fn display_name(&self) -> &str {
        &self.display
    }

    /// Key used for equality, hashing and cache lookups
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

impl PartialEq for CopybookName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for CopybookName {}

impl Hash for CopybookName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for CopybookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// A successfully resolved copybook.
///
/// Only produced when a provider found content; a missing copybook is
/// represented by `None`, never by a model with empty text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopybookModel {
    pub name: CopybookName,
    /// Where the content was found (the resolved URI, not the including file)
    pub uri: String,
    pub content: String,
}

impl CopybookModel {
    pub fn new(name: CopybookName, uri: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name,
            uri: uri.into(),
            content: content.into(),
        }
    }
}
