//
// copybook/resolver.rs
//
// Copybook resolution engine: provider chain, per-run cache and recursive
// expansion of copy directives
//

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use super::config::{CopybookConfig, CopybookProcessingMode, DirectiveFallback};
use super::content_provider::{CopybookContentProvider, FileCopybookContentProvider};
use super::dialect::{DialectPolicy, PredefinedCopybookProvider};
use super::directive::{
    has_sequence_area, scan_directives, CopyDirective, DirectiveKind, SEQUENCE_AREA,
};
use super::file_system::LocalFileSystem;
use super::locator::{synthetic_uri, CopybookLocator, SearchPathLocator};
use super::name::{CopybookModel, CopybookName};
use super::replacing::apply_replacing;
use super::source_map::{LineIndex, LineOrigin, SourceMap};
use crate::diagnostic::{push_unique, Diagnostic, ErrorCode};
use crate::locality::Locality;
use crate::perf::TimingGuard;

/// A copybook that was spliced into the expanded text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopybookUsage {
    pub name: CopybookName,
    /// Where the content came from
    pub uri: String,
    /// The directive, in the coordinates of the file that contains it
    pub locality: Locality,
    pub kind: DirectiveKind,
    /// 1 for directives in the analyzed document
    pub depth: usize,
}

/// Result of expanding one compilation unit
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpandedSource {
    pub text: String,
    pub source_map: SourceMap,
    pub diagnostics: Vec<Diagnostic>,
    pub copybooks: Vec<CopybookUsage>,
}

/// Owns the provider chain and the locator. Shared between concurrently
/// analyzed units; all per-run state lives in [`ResolutionSession`].
pub struct CopybookResolver {
    providers: Vec<Box<dyn CopybookContentProvider>>,
    locator: Box<dyn CopybookLocator>,
}

impl std::fmt::Debug for CopybookResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopybookResolver")
            .field("providers", &self.providers.len())
            .finish_non_exhaustive()
    }
}

impl CopybookResolver {
    pub fn new(locator: impl CopybookLocator + 'static) -> Self {
        Self {
            providers: Vec::new(),
            locator: Box::new(locator),
        }
    }

    /// Append a provider; providers are queried in the order added.
    pub fn with_provider(mut self, provider: impl CopybookContentProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Resolver over the local disk: search-path lookup, the file provider,
    /// then the dialect's predefined copybooks.
    pub fn for_local_files() -> Self {
        let files = Arc::new(LocalFileSystem::new());
        Self::new(SearchPathLocator::new(Arc::clone(&files)))
            .with_provider(FileCopybookContentProvider::new(files))
            .with_provider(PredefinedCopybookProvider::new())
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Start a run with an empty cache
    pub fn session(&self) -> ResolutionSession<'_> {
        ResolutionSession {
            resolver: self,
            models: HashMap::new(),
            locations: HashMap::new(),
        }
    }

    /// Expand every directive in `text`, recursively, with a fresh session.
    ///
    /// Resolution problems become diagnostics; only a provider fault is an
    /// error.
    pub fn expand(
        &self,
        uri: &str,
        text: &str,
        config: &CopybookConfig,
    ) -> anyhow::Result<ExpandedSource> {
        let _timer = TimingGuard::with_threshold("copybook_expand", 100);
        let mut session = self.session();
        let mut expander = Expander {
            session: &mut session,
            config,
            policy: DialectPolicy::for_config(config),
            writer: ExpansionWriter::default(),
            diagnostics: Vec::new(),
            copybooks: Vec::new(),
            stack: Vec::new(),
        };

        let root = Frame {
            uri: uri.to_string(),
            copybook: None,
            included_at: None,
            root_directive: None,
        };
        expander.expand_text(&root, text)?;

        let Expander {
            writer,
            diagnostics,
            copybooks,
            ..
        } = expander;
        log::debug!(
            "Expanded {}: {} copybook(s), {} diagnostic(s), {} cached lookup(s)",
            uri,
            copybooks.len(),
            diagnostics.len(),
            session.cached_len()
        );
        Ok(ExpandedSource {
            text: writer.text,
            source_map: SourceMap::new(writer.origins),
            diagnostics,
            copybooks,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    name: CopybookName,
    uri: String,
    fingerprint: u64,
}

/// Per-run resolution state: a cache of provider answers, hits and misses
/// alike, keyed by name, resolved URI and configuration.
pub struct ResolutionSession<'r> {
    resolver: &'r CopybookResolver,
    models: HashMap<CacheKey, Option<CopybookModel>>,
    locations: HashMap<CacheKey, String>,
}

impl<'r> ResolutionSession<'r> {
    /// Resolve `name` to a model, querying providers in order on a cache miss.
    ///
    /// Never calls a provider unless processing is enabled. A provider
    /// returning `Err` aborts the lookup with that error.
    pub fn resolve(
        &mut self,
        config: &CopybookConfig,
        name: &CopybookName,
        requesting_uri: &str,
        resolved_uri: &str,
    ) -> anyhow::Result<Option<CopybookModel>> {
        if !config.processing_mode.resolves() {
            return Ok(None);
        }

        let key = CacheKey {
            name: name.clone(),
            uri: resolved_uri.to_string(),
            fingerprint: config.fingerprint(),
        };
        if let Some(cached) = self.models.get(&key) {
            log::debug!(
                "Copybook cache {} for {} at {}",
                if cached.is_some() { "hit" } else { "hit (miss recorded)" },
                name,
                resolved_uri
            );
            return Ok(cached.clone());
        }

        let mut found = None;
        for (i, provider) in self.resolver.providers.iter().enumerate() {
            let model = provider
                .read(config, name, requesting_uri, resolved_uri)
                .with_context(|| {
                    format!(
                        "copybook provider {} failed reading {} at {} (requested by {})",
                        i, name, resolved_uri, requesting_uri
                    )
                })?;
            if model.is_some() {
                found = model;
                break;
            }
        }

        log::debug!(
            "Copybook {} at {}: {}",
            name,
            resolved_uri,
            if found.is_some() { "resolved" } else { "not found" }
        );
        self.models.insert(key, found.clone());
        Ok(found)
    }

    /// URI the content of `name` should be read from, as seen from
    /// `requesting_uri`. Falls back to a synthetic URI.
    pub fn locate(
        &mut self,
        config: &CopybookConfig,
        name: &CopybookName,
        requesting_uri: &str,
    ) -> String {
        let key = CacheKey {
            name: name.clone(),
            uri: requesting_uri.to_string(),
            fingerprint: config.fingerprint(),
        };
        if let Some(uri) = self.locations.get(&key) {
            return uri.clone();
        }
        let uri = self
            .resolver
            .locator
            .locate(config, name, requesting_uri)
            .unwrap_or_else(|| synthetic_uri(name));
        self.locations.insert(key, uri.clone());
        uri
    }

    /// Number of cached provider answers
    pub fn cached_len(&self) -> usize {
        self.models.len()
    }
}

/// Where text being expanded came from
struct Frame {
    uri: String,
    copybook: Option<CopybookName>,
    included_at: Option<Locality>,
    root_directive: Option<Locality>,
}

/// Accumulates expanded text with one origin record per output line
#[derive(Default)]
struct ExpansionWriter {
    text: String,
    origins: Vec<LineOrigin>,
    line_open: bool,
    line_start: usize,
}

impl ExpansionWriter {
    fn push(
        &mut self,
        text: &str,
        index: &LineIndex,
        range: Range<usize>,
        frame: &Frame,
        blank: bool,
    ) {
        let mut pos = range.start;
        while pos < range.end {
            if !self.line_open {
                let position = index.position(text, pos);
                self.origins.push(LineOrigin {
                    uri: frame.uri.clone(),
                    line: position.line,
                    column_offset: position.character,
                    copybook: frame.copybook.clone(),
                    included_at: frame.included_at.clone(),
                    root_directive: frame.root_directive.clone(),
                });
                self.line_open = true;
                self.line_start = self.text.len();
            }

            let chunk_end = text[pos..range.end]
                .find('\n')
                .map(|i| pos + i + 1)
                .unwrap_or(range.end);
            let chunk = &text[pos..chunk_end];
            if blank {
                self.text.extend(
                    chunk
                        .chars()
                        .map(|c| if c == '\n' || c == '\r' { c } else { ' ' }),
                );
            } else {
                self.text.push_str(chunk);
            }
            if chunk.ends_with('\n') {
                self.line_open = false;
            }
            pos = chunk_end;
        }
    }

    /// Spliced content starts on its own line. Whitespace before the
    /// directive on the same line is dropped, along with a bare sequence
    /// number.
    fn close_line_for_splice(&mut self) {
        if !self.line_open {
            return;
        }
        let line = &self.text[self.line_start..];
        let code = match self.origins.last() {
            Some(origin) if origin.column_offset == 0 && has_sequence_area(line) => {
                &line[SEQUENCE_AREA..]
            }
            _ => line,
        };
        if code.trim().is_empty() {
            self.text.truncate(self.line_start);
            self.origins.pop();
        } else {
            self.text.push('\n');
        }
        self.line_open = false;
    }

    fn ensure_newline(&mut self) {
        if self.line_open {
            self.text.push('\n');
            self.line_open = false;
        }
    }
}

struct Expander<'s, 'r> {
    session: &'s mut ResolutionSession<'r>,
    config: &'s CopybookConfig,
    policy: DialectPolicy,
    writer: ExpansionWriter,
    diagnostics: Vec<Diagnostic>,
    copybooks: Vec<CopybookUsage>,
    /// Copybooks currently being expanded, outermost first
    stack: Vec<CopybookName>,
}

impl Expander<'_, '_> {
    fn expand_text(&mut self, frame: &Frame, text: &str) -> anyhow::Result<()> {
        let index = LineIndex::new(text);
        let mut directives = scan_directives(&frame.uri, text, &self.policy);
        if frame.copybook.is_none() && self.config.processing_mode.resolves() {
            let implicit = self.policy.implicit_directives(&frame.uri, text, &directives);
            directives.extend(implicit);
            directives.sort_by_key(|d| d.span.start);
        }

        let mut cursor = 0;
        for directive in &directives {
            if directive.span.start < cursor {
                continue;
            }
            self.writer
                .push(text, &index, cursor..directive.span.start, frame, false);

            match self.include(frame, directive)? {
                Some(model) => {
                    let content = if directive.replacing.is_empty() {
                        model.content
                    } else {
                        apply_replacing(&model.content, &directive.replacing)
                    };
                    let child = Frame {
                        uri: model.uri,
                        copybook: Some(directive.name.clone()),
                        included_at: Some(directive.locality.clone()),
                        root_directive: frame
                            .root_directive
                            .clone()
                            .or_else(|| Some(directive.locality.clone())),
                    };

                    self.writer.close_line_for_splice();
                    self.stack.push(directive.name.clone());
                    let nested = self.expand_text(&child, &content);
                    self.stack.pop();
                    nested?;
                    self.writer.ensure_newline();

                    cursor = directive.span.end;
                    let line_end = index.line_end(text, index.line_of(cursor));
                    if text[cursor..line_end].trim().is_empty() {
                        cursor = (line_end + 1).min(text.len());
                    }
                }
                None => {
                    let blank = self.config.unexpanded_directive == DirectiveFallback::Blank;
                    self.writer
                        .push(text, &index, directive.span.clone(), frame, blank);
                    cursor = directive.span.end;
                }
            }
        }
        self.writer.push(text, &index, cursor..text.len(), frame, false);
        Ok(())
    }

    fn report(&mut self, directive: &CopyDirective, code: ErrorCode, message: String) {
        push_unique(
            &mut self.diagnostics,
            Diagnostic::new(
                directive.locality.clone(),
                code.default_severity(),
                code,
                message,
            ),
        );
    }

    /// Decide whether `directive` is expanded, returning the model to splice
    fn include(
        &mut self,
        frame: &Frame,
        directive: &CopyDirective,
    ) -> anyhow::Result<Option<CopybookModel>> {
        let name = &directive.name;
        log::trace!("Directive {} at {}", name, directive.locality);

        match self.config.processing_mode {
            CopybookProcessingMode::Enabled => {}
            CopybookProcessingMode::Disabled => {
                self.report(
                    directive,
                    ErrorCode::ProcessingDisabled,
                    format!("Copybook processing is disabled; {} was not expanded", name),
                );
                return Ok(None);
            }
            CopybookProcessingMode::Skip => {
                self.report(
                    directive,
                    ErrorCode::ProcessingSkipped,
                    format!("Copybook {} skipped for this run", name),
                );
                return Ok(None);
            }
        }

        if self.stack.contains(name) {
            let chain: Vec<&str> = self
                .stack
                .iter()
                .map(CopybookName::display_name)
                .chain(std::iter::once(name.display_name()))
                .collect();
            let message = format!("Recursive copybook inclusion: {}", chain.join(" -> "));
            self.report(directive, ErrorCode::ResolutionCycle, message);
            return Ok(None);
        }

        if self.stack.len() >= self.config.max_depth {
            self.report(
                directive,
                ErrorCode::MaxDepthExceeded,
                format!(
                    "Copybook {} nested deeper than {} levels",
                    name, self.config.max_depth
                ),
            );
            return Ok(None);
        }

        let resolved_uri = self.session.locate(self.config, name, &frame.uri);
        let model = self
            .session
            .resolve(self.config, name, &frame.uri, &resolved_uri)?;

        match model {
            Some(model) => {
                self.copybooks.push(CopybookUsage {
                    name: name.clone(),
                    uri: model.uri.clone(),
                    locality: directive.locality.clone(),
                    kind: directive.kind,
                    depth: self.stack.len() + 1,
                });
                Ok(Some(model))
            }
            None => {
                let message = match directive.kind {
                    DirectiveKind::Implicit => {
                        format!("Implicit copybook {} could not be resolved", name)
                    }
                    _ => format!("Copybook {} could not be resolved", name),
                };
                self.report(directive, ErrorCode::ResolutionFailure, message);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copybook::content_provider::InMemoryCopybookProvider;

    /// Locator that never finds files, so every copybook gets a synthetic URI
    struct NoFiles;

    impl CopybookLocator for NoFiles {
        fn locate(&self, _: &CopybookConfig, _: &CopybookName, _: &str) -> Option<String> {
            None
        }
    }

    fn resolver(entries: &[(&str, &str)]) -> CopybookResolver {
        let provider = InMemoryCopybookProvider::new();
        for (name, content) in entries {
            provider.insert(name, *content);
        }
        CopybookResolver::new(NoFiles).with_provider(provider)
    }

    #[test]
    fn test_whole_line_directive_is_replaced_by_content() {
        let resolver = resolver(&[("BOOK", "       01 BOOK-A PIC X.\n       01 BOOK-B PIC 9.\n")]);
        let text = "       WORKING-STORAGE SECTION.\n       COPY BOOK.\n       01 AFTER PIC X.\n";
        let out = resolver
            .expand("file:///PROG.cbl", text, &CopybookConfig::default())
            .unwrap();

        assert_eq!(
            out.text,
            "       WORKING-STORAGE SECTION.\n       01 BOOK-A PIC X.\n       01 BOOK-B PIC 9.\n       01 AFTER PIC X.\n"
        );
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.source_map.line_count(), 4);

        let origin = out.source_map.origin(2).unwrap();
        assert_eq!(origin.uri, "copybook:///BOOK");
        assert_eq!(origin.line, 1);
        assert_eq!(origin.copybook, Some(CopybookName::new("BOOK")));

        let after = out.source_map.origin(3).unwrap();
        assert_eq!(after.uri, "file:///PROG.cbl");
        assert_eq!(after.line, 2);

        assert_eq!(out.copybooks.len(), 1);
        assert_eq!(out.copybooks[0].depth, 1);
    }

    #[test]
    fn test_inline_directive_splits_line() {
        let resolver = resolver(&[("MID", "01 M PIC X.")]);
        let text = "       01 A PIC X. COPY MID. 01 B PIC X.\n";
        let out = resolver
            .expand("file:///PROG.cbl", text, &CopybookConfig::default())
            .unwrap();

        assert_eq!(out.text, "       01 A PIC X. \n01 M PIC X.\n 01 B PIC X.\n");
        let rest = out.source_map.origin(2).unwrap();
        assert_eq!(rest.line, 0);
        assert_eq!(rest.column_offset, text.find(" 01 B").unwrap() as u32);
    }

    #[test]
    fn test_unresolved_directive_is_blanked() {
        let resolver = resolver(&[]);
        let text = "       COPY MISSING.\n       01 A PIC X.\n";
        let out = resolver
            .expand("file:///PROG.cbl", text, &CopybookConfig::default())
            .unwrap();

        assert_eq!(out.text, "                    \n       01 A PIC X.\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, ErrorCode::ResolutionFailure);
        assert_eq!(out.diagnostics[0].locality.uri(), "file:///PROG.cbl");
        assert_eq!(out.source_map.line_count(), 2);
    }

    #[test]
    fn test_keep_fallback_passes_text_through() {
        let resolver = resolver(&[]);
        let mut config = CopybookConfig::default();
        config.unexpanded_directive = DirectiveFallback::Keep;
        let text = "       COPY MISSING.\n";
        let out = resolver.expand("file:///PROG.cbl", text, &config).unwrap();
        assert_eq!(out.text, text);
    }

    #[test]
    fn test_replacing_applied_to_content() {
        let resolver = resolver(&[("REC", "       01 :P:-REC.\n          05 :P:-ID PIC 9.\n")]);
        let text = "       COPY REC REPLACING ==:P:== BY ==CUST==.\n";
        let out = resolver
            .expand("file:///PROG.cbl", text, &CopybookConfig::default())
            .unwrap();
        assert_eq!(out.text, "       01 CUST-REC.\n          05 CUST-ID PIC 9.\n");
    }

    #[test]
    fn test_leading_replacing_renames_prefixes() {
        let resolver = resolver(&[("REC", "       01 AA-REC.\n          05 AA-ID PIC 9.\n")]);
        let text = "       COPY REC REPLACING LEADING ==AA== BY ==CUST==.\n";
        let out = resolver
            .expand("file:///PROG.cbl", text, &CopybookConfig::default())
            .unwrap();
        assert_eq!(out.text, "       01 CUST-REC.\n          05 CUST-ID PIC 9.\n");
    }

    #[test]
    fn test_directive_continued_on_numbered_line() {
        let resolver = resolver(&[("REC", "       01 :P:-ID PIC X.\n")]);
        let text = "000100     COPY REC\n000200         REPLACING ==:P:== BY ==CUST==.\n000300 01 NEXT PIC 9.\n";
        let out = resolver
            .expand("file:///PROG.cbl", text, &CopybookConfig::default())
            .unwrap();

        assert!(out.diagnostics.is_empty());
        assert_eq!(out.text, "       01 CUST-ID PIC X.\n000300 01 NEXT PIC 9.\n");
        assert!(!out.text.contains("REPLACING"));
        assert_eq!(out.source_map.origin(0).unwrap().uri, "copybook:///REC");
        assert_eq!(out.source_map.origin(1).unwrap().line, 2);
    }

    #[test]
    fn test_nested_root_directive() {
        let resolver = resolver(&[("OUTER", "       COPY INNER.\n"), ("INNER", "       01 I PIC X.\n")]);
        let text = "       COPY OUTER.\n";
        let out = resolver
            .expand("file:///PROG.cbl", text, &CopybookConfig::default())
            .unwrap();

        assert_eq!(out.text, "       01 I PIC X.\n");
        let origin = out.source_map.origin(0).unwrap();
        assert_eq!(origin.uri, "copybook:///INNER");
        assert_eq!(origin.included_at.as_ref().unwrap().uri(), "copybook:///OUTER");
        assert_eq!(origin.root_directive.as_ref().unwrap().uri(), "file:///PROG.cbl");
        assert_eq!(out.copybooks.iter().map(|c| c.depth).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_implicit_sqlca_for_db2() {
        let resolver = CopybookResolver::new(NoFiles).with_provider(PredefinedCopybookProvider::new());
        let mut config = CopybookConfig::default();
        config.sql_backend = crate::copybook::config::SqlBackend::Db2Server;
        let text = "       WORKING-STORAGE SECTION.\n       01 A PIC X.\n       PROCEDURE DIVISION.\n           EXEC SQL COMMIT END-EXEC.\n";
        let out = resolver.expand("file:///PROG.cbl", text, &config).unwrap();

        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("01 SQLCA."));
        assert!(out.text.contains("01 SQLDA."));
        assert!(out.text.contains("       01 A PIC X.\n"));
        assert!(out
            .copybooks
            .iter()
            .all(|c| c.kind == DirectiveKind::Implicit));
    }
}
