//
// copybook/dialect.rs
//
// Dialect policy: which directive forms exist and which copybooks are
// implicitly present for the configured SQL backend
//

use std::sync::OnceLock;

use regex::Regex;

use super::config::{CopybookConfig, SqlBackend};
use super::content_provider::CopybookContentProvider;
use super::directive::{locality_of, mask_comments, CopyDirective, DirectiveKind};
use super::name::{CopybookModel, CopybookName};
use super::source_map::LineIndex;

const DB2_IMPLICIT: &[&str] = &["SQLCA", "SQLDA"];

const SQLCA: &str = "\
       01 SQLCA.
           05 SQLCAID     PIC X(8).
           05 SQLCABC     PIC S9(9) COMP-5.
           05 SQLCODE     PIC S9(9) COMP-5.
           05 SQLERRM.
              49 SQLERRML PIC S9(4) COMP-5.
              49 SQLERRMC PIC X(70).
           05 SQLERRP     PIC X(8).
           05 SQLERRD     PIC S9(9) COMP-5 OCCURS 6 TIMES.
           05 SQLWARN.
              10 SQLWARN0 PIC X.
              10 SQLWARN1 PIC X.
              10 SQLWARN2 PIC X.
              10 SQLWARN3 PIC X.
              10 SQLWARN4 PIC X.
              10 SQLWARN5 PIC X.
              10 SQLWARN6 PIC X.
              10 SQLWARN7 PIC X.
           05 SQLEXT.
              10 SQLWARN8 PIC X.
              10 SQLWARN9 PIC X.
              10 SQLWARNA PIC X.
              10 SQLSTATE PIC X(5).
";

const SQLDA: &str = "\
       01 SQLDA.
           05 SQLDAID     PIC X(8).
           05 SQLDABC     PIC S9(9) COMP-5.
           05 SQLN        PIC S9(4) COMP-5.
           05 SQLD        PIC S9(4) COMP-5.
           05 SQLVAR      OCCURS 1 TO 750 TIMES DEPENDING ON SQLN.
              10 SQLTYPE  PIC S9(4) COMP-5.
              10 SQLLEN   PIC S9(4) COMP-5.
              10 SQLDATA  USAGE POINTER.
              10 SQLIND   USAGE POINTER.
              10 SQLNAME.
                 49 SQLNAMEL PIC S9(4) COMP-5.
                 49 SQLNAMEC PIC X(30).
";

fn working_storage_header() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?im)^[ \t0-9]*WORKING-STORAGE\s+SECTION\s*\.").unwrap())
}

fn exec_sql() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bEXEC\s+SQL\b").unwrap())
}

/// Dialect-specific answers the resolution engine asks for. The engine holds
/// no per-dialect code of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectPolicy {
    backend: SqlBackend,
}

impl DialectPolicy {
    pub fn for_config(config: &CopybookConfig) -> Self {
        Self {
            backend: config.sql_backend,
        }
    }

    /// Whether `EXEC SQL INCLUDE name END-EXEC` is a copy directive
    pub fn recognizes_sql_include(&self) -> bool {
        self.backend != SqlBackend::None
    }

    /// Copybooks a program using embedded SQL gets without asking
    pub fn implicit_copybooks(&self) -> &'static [&'static str] {
        match self.backend {
            SqlBackend::Db2Server => DB2_IMPLICIT,
            SqlBackend::None | SqlBackend::DatacomServer => &[],
        }
    }

    /// Zero-width directives for implicit copybooks, placed at the start of
    /// the line after the `WORKING-STORAGE SECTION.` header.
    ///
    /// Nothing is injected unless the text contains `EXEC SQL`, and a
    /// copybook already included explicitly is not injected again.
    pub fn implicit_directives(
        &self,
        uri: &str,
        text: &str,
        explicit: &[CopyDirective],
    ) -> Vec<CopyDirective> {
        let implicit = self.implicit_copybooks();
        if implicit.is_empty() {
            return Vec::new();
        }

        let masked = mask_comments(text);
        if !exec_sql().is_match(&masked) {
            return Vec::new();
        }
        let Some(header) = working_storage_header().find(&masked) else {
            log::debug!("{} uses EXEC SQL but has no WORKING-STORAGE SECTION", uri);
            return Vec::new();
        };

        let at = masked[header.end()..]
            .find('\n')
            .map(|i| header.end() + i + 1)
            .unwrap_or(text.len());
        let index = LineIndex::new(text);

        implicit
            .iter()
            .map(|name| CopybookName::new(name))
            .filter(|name| !explicit.iter().any(|d| &d.name == name))
            .map(|name| CopyDirective {
                kind: DirectiveKind::Implicit,
                name,
                library: None,
                replacing: Vec::new(),
                span: at..at,
                locality: locality_of(uri, text, &index, &(at..at)),
            })
            .collect()
    }
}

/// Serves the dialect's predefined copybooks by name when the configured
/// backend defines them. Placed last in a provider chain, so project files
/// with the same name take precedence.
#[derive(Debug, Default)]
pub struct PredefinedCopybookProvider;

impl PredefinedCopybookProvider {
    pub fn new() -> Self {
        Self
    }

    fn content(backend: SqlBackend, name: &CopybookName) -> Option<&'static str> {
        match (backend, name.normalized()) {
            (SqlBackend::Db2Server, "SQLCA") => Some(SQLCA),
            (SqlBackend::Db2Server, "SQLDA") => Some(SQLDA),
            _ => None,
        }
    }
}

impl CopybookContentProvider for PredefinedCopybookProvider {
    fn read(
        &self,
        config: &CopybookConfig,
        name: &CopybookName,
        _requesting_uri: &str,
        resolved_uri: &str,
    ) -> anyhow::Result<Option<CopybookModel>> {
        Ok(Self::content(config.sql_backend, name)
            .map(|content| CopybookModel::new(name.clone(), resolved_uri, content)))
    }
}
