//
// copybook/directive.rs
//
// Recognition of copy directives in COBOL source text
//

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::dialect::DialectPolicy;
use super::name::CopybookName;
use super::source_map::LineIndex;
use crate::locality::Locality;

/// How a directive entered the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DirectiveKind {
    /// `COPY name.`
    Copy,
    /// `EXEC SQL INCLUDE name END-EXEC`
    SqlInclude,
    /// Injected by the dialect policy, no text in the source
    Implicit,
}

/// One side of a `REPLACING ... BY ...` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacingOperand {
    /// `==text==`, the text between the delimiters
    PseudoText(String),
    /// A single word or literal (quotes kept)
    Word(String),
}

impl ReplacingOperand {
    pub fn text(&self) -> &str {
        match self {
            Self::PseudoText(t) | Self::Word(t) => t,
        }
    }
}

/// Which part of a text word a replacement may match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplacingMode {
    /// The operand as a whole
    #[default]
    Full,
    /// `LEADING`: the start of a word
    Leading,
    /// `TRAILING`: the end of a word
    Trailing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub from: ReplacingOperand,
    pub to: ReplacingOperand,
    pub mode: ReplacingMode,
}

/// A recognized directive and where it sits in the scanned text
#[derive(Debug, Clone, PartialEq)]
pub struct CopyDirective {
    pub kind: DirectiveKind,
    pub name: CopybookName,
    /// `OF`/`IN` library qualifier, recorded but not used for lookup
    pub library: Option<String>,
    pub replacing: Vec<Replacement>,
    /// Byte span of the directive text, terminating period included
    pub span: Range<usize>,
    pub locality: Locality,
}

struct DirectivePatterns {
    copy_keyword: Regex,
    sql_include: Regex,
}

fn patterns() -> &'static DirectivePatterns {
    static PATTERNS: OnceLock<DirectivePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| DirectivePatterns {
        copy_keyword: Regex::new(r"(?i)\bCOPY\b").unwrap(),
        // Groups: 1=copybook name (quoted or bare)
        sql_include: Regex::new(
            r#"(?i)\bEXEC\s+SQL\s+INCLUDE\s+("[^"\n]+"|'[^'\n]+'|[A-Za-z0-9_$#@-]+)\s+END-EXEC\b(?:[ \t]*\.)?"#,
        )
        .unwrap(),
    })
}

/// Columns 1-6 of a fixed-format line
pub(crate) const SEQUENCE_AREA: usize = 6;
/// Columns from 73 on are the identification area
const PROGRAM_AREA_END: usize = 72;

/// Whether `line` starts with a fixed-format sequence area: six columns of
/// digits or spaces.
pub(crate) fn has_sequence_area(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= SEQUENCE_AREA
        && bytes[..SEQUENCE_AREA]
            .iter()
            .all(|b| b.is_ascii_digit() || *b == b' ')
}

/// Whether a whole line is a comment: `*` or `/` in the fixed-format
/// indicator column (column 7), or a free-format `*>` line.
pub fn is_comment_line(line: &str) -> bool {
    if line.trim_start().starts_with("*>") {
        return true;
    }
    has_sequence_area(line) && matches!(line.as_bytes().get(SEQUENCE_AREA), Some(b'*' | b'/'))
}

/// Byte offset of an inline `*>` comment outside literals
fn inline_comment_start(line: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let bytes = line.as_bytes();
    for i in 0..bytes.len() {
        match (quote, bytes[i]) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(bytes[i]),
            (None, b'*') if bytes.get(i + 1) == Some(&b'>') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Copy of `text` with comments replaced by spaces. On fixed-format lines
/// the sequence and identification areas are blanked as well. Byte offsets
/// are preserved, so matches in the masked text index the original.
pub fn mask_comments(text: &str) -> String {
    let blank = |out: &mut String, len: usize| out.extend(std::iter::repeat(' ').take(len));

    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let body = line.strip_suffix('\n').unwrap_or(line);
        if is_comment_line(body) {
            blank(&mut out, body.len());
        } else {
            let (start, end) = if has_sequence_area(body) {
                let end = (PROGRAM_AREA_END..=body.len())
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(body.len());
                (SEQUENCE_AREA, end)
            } else {
                (0, body.len())
            };
            let code_end = inline_comment_start(&body[start..end])
                .map(|i| start + i)
                .unwrap_or(end);
            blank(&mut out, start);
            out.push_str(&body[start..code_end]);
            blank(&mut out, body.len() - code_end);
        }
        out.push_str(&line[body.len()..]);
    }
    out
}

/// Whether `offset` falls inside a literal opened earlier on its line
fn inside_literal(masked: &str, offset: usize) -> bool {
    let line_start = masked[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let mut quote: Option<char> = None;
    for c in masked[line_start..offset].chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None => {}
        }
    }
    quote.is_some()
}

fn preceded_by_separator(text: &str, offset: usize) -> bool {
    text[..offset]
        .chars()
        .next_back()
        .map(|c| c.is_whitespace())
        .unwrap_or(true)
}

fn followed_by_separator(text: &str, offset: usize) -> bool {
    text[offset..]
        .chars()
        .next()
        .map(|c| c.is_whitespace())
        .unwrap_or(true)
}

/// Find every directive in `text`, in source order.
///
/// Comment lines and literals are ignored. `EXEC SQL INCLUDE` is only
/// recognized when the dialect policy says so. Implicit directives are not
/// part of the result; see [`DialectPolicy::implicit_directives`].
pub fn scan_directives(uri: &str, text: &str, policy: &DialectPolicy) -> Vec<CopyDirective> {
    let masked = mask_comments(text);
    let index = LineIndex::new(text);
    let patterns = patterns();
    let mut directives = Vec::new();

    for m in patterns.copy_keyword.find_iter(&masked) {
        if !preceded_by_separator(&masked, m.start())
            || !followed_by_separator(&masked, m.end())
            || inside_literal(&masked, m.start())
        {
            continue;
        }
        if directives
            .last()
            .map(|d: &CopyDirective| m.start() < d.span.end)
            .unwrap_or(false)
        {
            continue;
        }
        let Some(parsed) = parse_copy_statement(&masked, m.end()) else {
            log::trace!("Ignoring COPY without a name at byte {} in {}", m.start(), uri);
            continue;
        };
        let span = m.start()..parsed.end;
        directives.push(CopyDirective {
            kind: DirectiveKind::Copy,
            name: parsed.name,
            library: parsed.library,
            replacing: parsed.replacing,
            locality: locality_of(uri, text, &index, &span),
            span,
        });
    }

    if policy.recognizes_sql_include() {
        for caps in patterns.sql_include.captures_iter(&masked) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(name) = caps.get(1) else { continue };
            if !preceded_by_separator(&masked, whole.start())
                || inside_literal(&masked, whole.start())
            {
                continue;
            }
            let span = whole.range();
            if directives
                .iter()
                .any(|d| d.span.start < span.end && span.start < d.span.end)
            {
                continue;
            }
            directives.push(CopyDirective {
                kind: DirectiveKind::SqlInclude,
                name: CopybookName::new(name.as_str()),
                library: None,
                replacing: Vec::new(),
                locality: locality_of(uri, text, &index, &span),
                span,
            });
        }
        directives.sort_by_key(|d| d.span.start);
    }

    log::trace!("Found {} copy directive(s) in {}", directives.len(), uri);
    directives
}

pub(crate) fn locality_of(
    uri: &str,
    text: &str,
    index: &LineIndex,
    span: &Range<usize>,
) -> Locality {
    Locality::new(
        uri,
        tower_lsp::lsp_types::Range {
            start: index.position(text, span.start),
            end: index.position(text, span.end),
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    PseudoText,
    Period,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    end: usize,
}

impl Token<'_> {
    fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ',' || c == ';'
}

fn next_token(text: &str, from: usize) -> Option<Token<'_>> {
    let rest = &text[from..];
    let skipped = rest.len() - rest.trim_start_matches(is_separator).len();
    let start = from + skipped;
    let rest = &text[start..];
    let first = rest.chars().next()?;

    if let Some(inner) = rest.strip_prefix("==") {
        return Some(match inner.find("==") {
            Some(close) => Token {
                kind: TokenKind::PseudoText,
                text: &inner[..close],
                end: start + 2 + close + 2,
            },
            None => Token {
                kind: TokenKind::PseudoText,
                text: inner,
                end: text.len(),
            },
        });
    }

    if first == '"' || first == '\'' {
        let len = rest[1..]
            .find(first)
            .map(|close| close + 2)
            .unwrap_or(rest.len());
        return Some(Token {
            kind: TokenKind::Word,
            text: &rest[..len],
            end: start + len,
        });
    }

    let at_boundary = |i: usize| rest[i..].chars().next().map(is_separator).unwrap_or(true);

    if first == '.' && at_boundary(1) {
        return Some(Token {
            kind: TokenKind::Period,
            text: ".",
            end: start + 1,
        });
    }

    let mut len = rest.find(is_separator).unwrap_or(rest.len());
    // A separator period ends the word without belonging to it
    if len > 1 && rest[..len].ends_with('.') {
        len -= 1;
    }
    Some(Token {
        kind: TokenKind::Word,
        text: &rest[..len],
        end: start + len,
    })
}

struct ParsedCopy {
    name: CopybookName,
    library: Option<String>,
    replacing: Vec<Replacement>,
    end: usize,
}

fn operand(token: &Token) -> Option<ReplacingOperand> {
    match token.kind {
        TokenKind::PseudoText => Some(ReplacingOperand::PseudoText(token.text.to_string())),
        TokenKind::Word => Some(ReplacingOperand::Word(token.text.to_string())),
        TokenKind::Period => None,
    }
}

/// Parse `name [OF|IN library] [SUPPRESS] [REPLACING a BY b ...] .` starting
/// right after the `COPY` keyword. An unterminated statement ends at the
/// last token that belongs to it.
fn parse_copy_statement(text: &str, from: usize) -> Option<ParsedCopy> {
    let name_token = next_token(text, from).filter(|t| t.kind == TokenKind::Word)?;
    let mut parsed = ParsedCopy {
        name: CopybookName::new(name_token.text),
        library: None,
        replacing: Vec::new(),
        end: name_token.end,
    };
    if parsed.name.normalized().is_empty() {
        return None;
    }

    let mut in_replacing = false;
    while let Some(token) = next_token(text, parsed.end) {
        if token.kind == TokenKind::Period {
            parsed.end = token.end;
            break;
        }

        if in_replacing {
            let mut from_token = token;
            let mode = if token.is_keyword("LEADING") {
                ReplacingMode::Leading
            } else if token.is_keyword("TRAILING") {
                ReplacingMode::Trailing
            } else {
                ReplacingMode::Full
            };
            if mode != ReplacingMode::Full {
                match next_token(text, from_token.end) {
                    Some(t) => from_token = t,
                    None => break,
                }
            }
            let Some(by) = next_token(text, from_token.end).filter(|t| t.is_keyword("BY")) else {
                break;
            };
            let Some(to_token) = next_token(text, by.end) else {
                break;
            };
            match (operand(&from_token), operand(&to_token)) {
                (Some(from), Some(to)) => {
                    parsed.replacing.push(Replacement { from, to, mode });
                    parsed.end = to_token.end;
                }
                _ => break,
            }
            continue;
        }

        if (token.is_keyword("OF") || token.is_keyword("IN")) && parsed.library.is_none() {
            let Some(library) = next_token(text, token.end).filter(|t| t.kind == TokenKind::Word)
            else {
                break;
            };
            parsed.library = Some(CopybookName::new(library.text).display_name().to_string());
            parsed.end = library.end;
        } else if token.is_keyword("SUPPRESS") {
            parsed.end = token.end;
        } else if token.is_keyword("REPLACING") {
            in_replacing = true;
            parsed.end = token.end;
        } else {
            break;
        }
    }

    Some(parsed)
}
