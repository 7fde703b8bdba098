//
// analysis.rs
//
// Document analysis pipeline: expansion, parsing, tree build, traversal
//

use anyhow::Context;

use crate::config::AnalysisConfig;
use crate::copybook::resolver::{CopybookResolver, ExpandedSource};
use crate::diagnostic::{push_unique, Diagnostic};
use crate::perf::TimingGuard;
use crate::tree::{ParseEvent, SyntaxTree, TreeBuilder};

/// Turns (expanded) COBOL text into parse events.
///
/// Parsing itself is outside this crate; implementations adapt whatever
/// parser the host uses. An `Err` is a parser fault and aborts the analysis.
pub trait SourceParser: Send + Sync {
    fn parse(&self, uri: &str, text: &str) -> anyhow::Result<Vec<ParseEvent>>;
}

impl<F> SourceParser for F
where
    F: Fn(&str, &str) -> anyhow::Result<Vec<ParseEvent>> + Send + Sync,
{
    fn parse(&self, uri: &str, text: &str) -> anyhow::Result<Vec<ParseEvent>> {
        self(uri, text)
    }
}

/// Everything one document analysis produced
#[derive(Debug)]
pub struct AnalysisResult {
    pub expanded: ExpandedSource,
    pub tree: SyntaxTree,
    /// Expansion diagnostics followed by tree diagnostics, with configured
    /// severities applied. Identical diagnostics appear once.
    pub diagnostics: Vec<Diagnostic>,
}

/// Build a tree from `events` and run the traversal over it.
pub fn build_and_analyze(
    uri: &str,
    events: impl IntoIterator<Item = ParseEvent>,
    config: &AnalysisConfig,
) -> (SyntaxTree, Vec<Diagnostic>) {
    let mut builder = TreeBuilder::new(uri);
    for event in events {
        builder.push(event);
    }
    let mut tree = builder.finish();
    let diagnostics = tree.analyze();
    (tree, config.apply_severities(diagnostics))
}

/// Analyze one document: expand copybooks, parse the expanded text, build
/// the tree with localities mapped back to their files, then traverse it.
pub fn analyze_document(
    uri: &str,
    text: &str,
    resolver: &CopybookResolver,
    config: &AnalysisConfig,
    parser: &dyn SourceParser,
) -> anyhow::Result<AnalysisResult> {
    let _timer = TimingGuard::with_threshold("analyze_document", 250);

    let expanded = resolver
        .expand(uri, text, &config.copybooks)
        .with_context(|| format!("expanding copybooks of {}", uri))?;
    let events = parser
        .parse(uri, &expanded.text)
        .with_context(|| format!("parsing {}", uri))?;
    log::trace!("{} parse event(s) for {}", events.len(), uri);

    let mut builder = TreeBuilder::new(uri).with_source_map(&expanded.source_map);
    for event in events {
        builder.push(event);
    }
    builder.add_copybooks(&expanded.copybooks);
    let mut tree = builder.finish();

    // A copybook spliced in twice yields the same remapped diagnostic twice
    let mut diagnostics = expanded.diagnostics.clone();
    for diagnostic in tree.analyze() {
        push_unique(&mut diagnostics, diagnostic);
    }
    let diagnostics = config.apply_severities(diagnostics);

    log::debug!("Analyzed {}: {} diagnostic(s)", uri, diagnostics.len());
    Ok(AnalysisResult {
        expanded,
        tree,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::ErrorCode;
    use crate::locality::Locality;

    const URI: &str = "file:///PROG.cbl";

    fn at(line: u32) -> Locality {
        Locality::point(URI, line, 11)
    }

    fn program(events: Vec<ParseEvent>) -> Vec<ParseEvent> {
        let mut all = vec![ParseEvent::StartProgram {
            name: "PROG".into(),
            locality: at(0),
        }];
        all.extend(events);
        all.push(ParseEvent::EndProgram);
        all
    }

    #[test]
    fn test_undefined_usage_independent_of_order() {
        let usage = ParseEvent::CodeBlockUsage {
            name: "MISSING".into(),
            locality: at(5),
        };
        let paragraph = ParseEvent::Paragraph {
            name: "MAIN".into(),
            locality: at(4),
        };

        let (_, before) = build_and_analyze(
            URI,
            program(vec![paragraph.clone(), usage.clone()]),
            &AnalysisConfig::default(),
        );
        let (_, after) = build_and_analyze(
            URI,
            program(vec![usage, paragraph]),
            &AnalysisConfig::default(),
        );

        for diagnostics in [before, after] {
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].code, ErrorCode::UndefinedCodeBlock);
            assert_eq!(diagnostics[0].locality, at(5));
        }
    }

    #[test]
    fn test_declared_usage_before_or_after_is_clean() {
        let events = program(vec![
            ParseEvent::Paragraph {
                name: "A".into(),
                locality: at(1),
            },
            ParseEvent::CodeBlockUsage {
                name: "B".into(),
                locality: at(2),
            },
            ParseEvent::Paragraph {
                name: "B".into(),
                locality: at(3),
            },
            ParseEvent::CodeBlockUsage {
                name: "a".into(),
                locality: at(4),
            },
        ]);
        let (_, diagnostics) = build_and_analyze(URI, events, &AnalysisConfig::default());
        assert!(diagnostics.is_empty());
    }

    struct NoFiles;

    impl crate::copybook::CopybookLocator for NoFiles {
        fn locate(
            &self,
            _: &crate::copybook::CopybookConfig,
            _: &crate::copybook::CopybookName,
            _: &str,
        ) -> Option<String> {
            None
        }
    }

    /// Emits a usage for every `PERFORM MISSING` line of the expanded text
    fn perform_parser(uri: &str, text: &str) -> anyhow::Result<Vec<ParseEvent>> {
        let mut events = vec![ParseEvent::StartProgram {
            name: "PROG".into(),
            locality: Locality::point(uri, 0, 7),
        }];
        for (line, content) in text.lines().enumerate() {
            if let Some(col) = content.find("PERFORM MISSING") {
                let start = col as u32 + 8;
                events.push(ParseEvent::CodeBlockUsage {
                    name: "MISSING".into(),
                    locality: Locality::from_coords(uri, line as u32, start, line as u32, start + 7),
                });
            }
        }
        events.push(ParseEvent::EndProgram);
        Ok(events)
    }

    #[test]
    fn test_copybook_spliced_twice_reports_usage_once() {
        let provider = crate::copybook::InMemoryCopybookProvider::new()
            .with("STEP", "           PERFORM MISSING.\n");
        let resolver = CopybookResolver::new(NoFiles).with_provider(provider);
        let text = "       PROCEDURE DIVISION.\n       MAIN.\n       COPY STEP.\n       COPY STEP.\n";

        let result = analyze_document(
            URI,
            text,
            &resolver,
            &AnalysisConfig::default(),
            &perform_parser,
        )
        .unwrap();

        assert_eq!(result.expanded.text.matches("PERFORM MISSING").count(), 2);
        assert_eq!(result.diagnostics.len(), 1);
        let diagnostic = &result.diagnostics[0];
        assert_eq!(diagnostic.code, ErrorCode::UndefinedCodeBlock);
        assert_eq!(diagnostic.locality.uri(), "copybook:///STEP");
        assert_eq!(diagnostic.locality.start().line, 0);
        assert_eq!(diagnostic.locality.start().character, 19);
    }

    #[test]
    fn test_closure_parser() {
        let parser = |_: &str, _: &str| -> anyhow::Result<Vec<ParseEvent>> { Ok(Vec::new()) };
        let resolver = CopybookResolver::new(crate::copybook::SearchPathLocator::new(
            crate::copybook::LocalFileSystem::new(),
        ));
        let result =
            analyze_document(URI, "", &resolver, &AnalysisConfig::default(), &parser).unwrap();
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.tree.len(), 1);
    }
}
