//
// copybook/source_map.rs
//
// Line-granular mapping from expanded text back to the files it came from
//

use serde::Serialize;
use tower_lsp::lsp_types::{Position, Range};

use super::name::CopybookName;
use crate::locality::Locality;
use crate::utf16::byte_offset_to_utf16_column;

/// Byte offsets of line starts, for turning offsets into positions
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    /// 0-based line containing `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.starts.get(line).copied().unwrap_or(usize::MAX)
    }

    /// Byte offset of the end of `line`, excluding its newline
    pub fn line_end(&self, text: &str, line: usize) -> usize {
        self.starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(text.len())
    }

    /// LSP position (UTF-16 column) for a byte offset
    pub fn position(&self, text: &str, offset: usize) -> Position {
        let line = self.line_of(offset);
        let start = self.starts[line];
        let line_text = &text[start..self.line_end(text, line)];
        Position::new(
            line as u32,
            byte_offset_to_utf16_column(line_text, offset - start),
        )
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

/// Where one line of expanded text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineOrigin {
    /// URI of the file the line was taken from
    pub uri: String,
    /// 0-based line in that file
    pub line: u32,
    /// Added to an expanded column to get the original column. Non-zero when
    /// a line was split after an inline directive.
    pub column_offset: u32,
    /// Copybook the line belongs to, `None` for the analyzed document itself
    pub copybook: Option<CopybookName>,
    /// Directive that spliced this line in, in its own file's coordinates
    pub included_at: Option<Locality>,
    /// Outermost directive in the analyzed document leading to this line
    pub root_directive: Option<Locality>,
}

/// Per-line origins of an expanded text
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceMap {
    origins: Vec<LineOrigin>,
}

impl SourceMap {
    pub fn new(origins: Vec<LineOrigin>) -> Self {
        Self { origins }
    }

    pub fn origin(&self, expanded_line: u32) -> Option<&LineOrigin> {
        self.origins.get(expanded_line as usize)
    }

    pub fn origins(&self) -> &[LineOrigin] {
        &self.origins
    }

    pub fn line_count(&self) -> usize {
        self.origins.len()
    }

    /// Translate a locality in expanded coordinates into the file it came from.
    ///
    /// Spans that cross a copybook boundary are clipped to their start line.
    /// Localities outside the map are returned unchanged.
    pub fn remap(&self, locality: &Locality) -> Locality {
        let range = locality.range();
        let Some(start_origin) = self.origin(range.start.line) else {
            return locality.clone();
        };

        let start = Position::new(
            start_origin.line,
            range.start.character + start_origin.column_offset,
        );
        let end = match self.origin(range.end.line) {
            Some(end_origin) if end_origin.uri == start_origin.uri => Position::new(
                end_origin.line,
                range.end.character + end_origin.column_offset,
            ),
            _ => start,
        };

        Locality::new(start_origin.uri.clone(), Range { start, end })
    }

    /// Locality in the analyzed document that best represents `locality`:
    /// the locality itself for document lines, or the outermost copy
    /// directive for lines that came from a copybook.
    pub fn root_locality(&self, locality: &Locality) -> Locality {
        match self
            .origin(locality.range().start.line)
            .and_then(|o| o.root_directive.as_ref())
        {
            Some(directive) => directive.clone(),
            None => self.remap(locality),
        }
    }

    /// Whether the expanded line came from a copybook
    pub fn is_from_copybook(&self, expanded_line: u32) -> bool {
        self.origin(expanded_line)
            .map(|o| o.copybook.is_some())
            .unwrap_or(false)
    }
}
