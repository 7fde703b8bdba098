//
// locality.rs
//
// Source positions attached to tree nodes and diagnostics
//

use std::fmt;

use serde::Serialize;
use tower_lsp::lsp_types::{Position, Range};

/// An immutable source span: the document (or copybook) URI plus an LSP range.
///
/// Lines are 0-based and columns are UTF-16 code units, matching what the
/// presentation layer hands to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locality {
    uri: String,
    range: Range,
}

impl Locality {
    pub fn new(uri: impl Into<String>, range: Range) -> Self {
        Self {
            uri: uri.into(),
            range,
        }
    }

    /// Build a locality from raw `(line, column)` pairs.
    pub fn from_coords(
        uri: impl Into<String>,
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    ) -> Self {
        Self::new(
            uri,
            Range {
                start: Position::new(start_line, start_col),
                end: Position::new(end_line, end_col),
            },
        )
    }

    /// Zero-width locality at a single position.
    pub fn point(uri: impl Into<String>, line: u32, col: u32) -> Self {
        Self::from_coords(uri, line, col, line, col)
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn start(&self) -> Position {
        self.range.start
    }

    pub fn end(&self) -> Position {
        self.range.end
    }

    /// Number of lines covered, counting a single-line span as 1.
    pub fn span_lines(&self) -> u32 {
        self.range.end.line.saturating_sub(self.range.start.line) + 1
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.uri,
            self.range.start.line + 1,
            self.range.start.character + 1
        )
    }
}
