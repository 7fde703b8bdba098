// analysis.rs - End-to-end analysis over copybooks on disk
//
// A small line-oriented parser stands in for a real COBOL parser: it
// understands just enough fixed-format source to emit the parse events
// these scenarios need.

use std::path::Path;

use heron::analysis::{analyze_document, AnalysisResult};
use heron::config::{parse_analysis_config, AnalysisConfig};
use heron::copybook::file_system::path_to_uri;
use heron::copybook::{CopybookConfig, CopybookProcessingMode, CopybookResolver, SqlBackend};
use heron::diagnostic::ErrorCode;
use heron::locality::Locality;
use heron::tree::{NodeKind, NodeType, ParseEvent};
use heron::variables::{Variable, VariableKind};
use serde_json::json;
use tempfile::TempDir;

fn locality(uri: &str, line: usize, text: &str, token: &str) -> Locality {
    let col = text.find(token).unwrap_or(0) as u32;
    Locality::from_coords(uri, line as u32, col, line as u32, col + token.len() as u32)
}

fn toy_parse(uri: &str, text: &str) -> anyhow::Result<Vec<ParseEvent>> {
    let mut events = Vec::new();
    // One entry per open program: whether its PROCEDURE DIVISION has started
    let mut procedure: Vec<bool> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        if line.len() < 8 || matches!(line.as_bytes()[6], b'*' | b'/') {
            continue;
        }
        let area_a = line.as_bytes()[7] != b' ';
        let tokens: Vec<&str> = line[7..]
            .split_whitespace()
            .map(|t| t.trim_end_matches('.'))
            .filter(|t| !t.is_empty())
            .collect();
        let Some(&first) = tokens.first() else {
            continue;
        };
        let at = |token: &str| locality(uri, line_no, line, token);

        match tokens.as_slice() {
            ["PROGRAM-ID", name, ..] => {
                procedure.push(false);
                events.push(ParseEvent::StartProgram {
                    name: name.to_string(),
                    locality: at(name),
                });
            }
            ["END", "PROGRAM", ..] => {
                procedure.pop();
                events.push(ParseEvent::EndProgram);
            }
            ["PROCEDURE", "DIVISION", ..] => {
                if let Some(flag) = procedure.last_mut() {
                    *flag = true;
                }
            }
            ["PERFORM", target, ..] => events.push(ParseEvent::CodeBlockUsage {
                name: target.to_string(),
                locality: at(target),
            }),
            ["DISPLAY", name, "OF", qualifier] => events.push(ParseEvent::VariableUsage {
                name: name.to_string(),
                qualifiers: vec![qualifier.to_string()],
                locality: at(name),
            }),
            ["DISPLAY", name] => events.push(ParseEvent::VariableUsage {
                name: name.to_string(),
                qualifiers: Vec::new(),
                locality: at(name),
            }),
            ["MOVE", from, "TO", to] => {
                for name in [from, to] {
                    events.push(ParseEvent::VariableUsage {
                        name: name.to_string(),
                        qualifiers: Vec::new(),
                        locality: at(name),
                    });
                }
            }
            [name, "SECTION"] if procedure.last() == Some(&true) => {
                events.push(ParseEvent::Section {
                    name: name.to_string(),
                    locality: at(name),
                })
            }
            [name] if area_a && procedure.last() == Some(&true) => {
                events.push(ParseEvent::Paragraph {
                    name: name.to_string(),
                    locality: at(name),
                })
            }
            [level, rest @ ..] if first.chars().all(|c| c.is_ascii_digit()) => {
                let value_after = |keyword: &str| {
                    rest.iter()
                        .position(|t| *t == keyword)
                        .and_then(|i| rest.get(i + 1))
                        .map(|t| t.to_string())
                };
                let name = rest.first().filter(|n| !matches!(**n, "PIC" | "VALUE"));
                events.push(ParseEvent::DataItem {
                    level: level.parse()?,
                    name: name.map(|n| n.to_string()),
                    pic: value_after("PIC"),
                    value: value_after("VALUE"),
                    locality: at(name.copied().unwrap_or(*level)),
                });
            }
            _ => {}
        }
    }
    Ok(events)
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(copybooks: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("copy")).unwrap();
        for (name, content) in copybooks {
            std::fs::write(dir.path().join("copy").join(format!("{}.cpy", name)), content)
                .unwrap();
        }
        Self { dir }
    }

    fn copy_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("copy")
    }

    fn copybook_uri(&self, name: &str) -> String {
        path_to_uri(&self.copy_dir().join(format!("{}.cpy", name)))
    }

    fn config(&self) -> AnalysisConfig {
        AnalysisConfig::with_copybooks(CopybookConfig::new(
            CopybookProcessingMode::Enabled,
            SqlBackend::None,
            vec![self.copy_dir()],
        ))
    }

    fn analyze(&self, program: &str, config: &AnalysisConfig) -> (String, AnalysisResult) {
        let path = self.dir.path().join("MAIN.cbl");
        std::fs::write(&path, program).unwrap();
        let uri = path_to_uri(Path::new(&path));
        let resolver = CopybookResolver::for_local_files();
        let result = analyze_document(&uri, program, &resolver, config, &toy_parse).unwrap();
        (uri, result)
    }
}

const CUSTOMER: &str = "\
       01 CUSTOMER.
          05 CUST-ID PIC 9(6).
          05 CUST-NAME PIC X(30).
";

const PARAGRAPHS: &str = "\
       SHARED-PARA.
           DISPLAY CUST-ID.
";

#[test]
fn copybook_definitions_resolve_usages_in_the_program() {
    let ws = Workspace::new(&[("CUSTOMER", CUSTOMER)]);
    let program = "\
       IDENTIFICATION DIVISION.
       PROGRAM-ID. MAIN.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       COPY CUSTOMER.
       PROCEDURE DIVISION.
       MAIN-PARA.
           MOVE CUST-ID TO WS-OUT.
           DISPLAY CUST-NAME OF CUSTOMER.
";
    let (uri, result) = ws.analyze(program, &ws.config());

    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    let diagnostic = &result.diagnostics[0];
    assert_eq!(diagnostic.code, ErrorCode::UndefinedVariable);
    assert_eq!(diagnostic.locality.uri(), uri);
    assert_eq!(diagnostic.locality.start().line, 7);

    let program_node = result.tree.nodes_of_type(NodeType::Program)[0];
    let registry = &result.tree.program(program_node).unwrap().registry;
    let declarations = registry.lookup_variable("cust-id", &[]);
    assert_eq!(declarations.len(), 1);
    assert_eq!(declarations[0].locality.uri(), ws.copybook_uri("CUSTOMER"));
    assert_eq!(declarations[0].locality.start().line, 1);
    assert_eq!(declarations[0].qualifiers, vec!["CUSTOMER".to_string()]);
}

#[test]
fn paragraphs_from_copybooks_and_forward_performs() {
    let ws = Workspace::new(&[("CUSTOMER", CUSTOMER), ("PARAS", PARAGRAPHS)]);
    let program = "\
       PROGRAM-ID. MAIN.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       COPY CUSTOMER.
       PROCEDURE DIVISION.
       MAIN-PARA.
           PERFORM SHARED-PARA.
           PERFORM LATER-PARA.
           PERFORM NOWHERE.
       LATER-PARA.
           DISPLAY CUST-ID.
       COPY PARAS.
";
    let (uri, result) = ws.analyze(program, &ws.config());

    let codes: Vec<ErrorCode> = result.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::UndefinedCodeBlock]);
    assert_eq!(result.diagnostics[0].locality.uri(), uri);
    assert_eq!(result.diagnostics[0].locality.start().line, 8);

    let copies: Vec<&str> = result
        .tree
        .nodes_of_type(NodeType::Copy)
        .into_iter()
        .filter_map(|id| result.tree.get(id).and_then(|n| n.kind().name()))
        .collect();
    assert_eq!(copies, vec!["CUSTOMER", "PARAS"]);
}

#[test]
fn missing_copybook_is_reported_at_the_directive() {
    let ws = Workspace::new(&[]);
    let program = "\
       PROGRAM-ID. MAIN.
       WORKING-STORAGE SECTION.
       COPY ABSENT.
";
    let (uri, result) = ws.analyze(program, &ws.config());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, ErrorCode::ResolutionFailure);
    assert_eq!(result.diagnostics[0].locality.uri(), uri);
    assert_eq!(result.diagnostics[0].locality.start().line, 2);
    assert!(result.expanded.copybooks.is_empty());
}

#[test]
fn independent_item_and_its_condition_names() {
    let ws = Workspace::new(&[]);
    let program = "\
       PROGRAM-ID. MAIN.
       WORKING-STORAGE SECTION.
       77 WS-FLAG PIC 9 VALUE 0.
       88 WS-DONE VALUE 1.
       PROCEDURE DIVISION.
       MAIN-PARA.
           DISPLAY WS-FLAG.
           DISPLAY WS-DONE.
           DISPLAY WS-DONE OF WS-FLAG.
";
    let (_, result) = ws.analyze(program, &ws.config());
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    let tree = &result.tree;
    let flag = tree
        .nodes_of_type(NodeType::VariableDefinition)
        .into_iter()
        .find(|&id| tree.get(id).and_then(|n| n.kind().name()) == Some("WS-FLAG"))
        .unwrap();
    let node = tree.get(flag).unwrap();
    assert!(node.children().is_empty());
    let NodeKind::VariableDefinition(definition) = node.kind() else {
        panic!("expected a variable definition");
    };
    assert!(matches!(definition.variable, VariableKind::Independent(_)));
    assert_eq!(definition.variable().pic_clause(), Some("9"));
    assert_eq!(definition.variable().value(), Some("0"));
}

#[test]
fn nested_programs_do_not_share_paragraphs() {
    let ws = Workspace::new(&[]);
    let program = "\
       PROGRAM-ID. OUTER.
       PROCEDURE DIVISION.
       OUTER-PARA.
           PERFORM INNER-PARA.
       PROGRAM-ID. INNER.
       PROCEDURE DIVISION.
       INNER-PARA.
           PERFORM OUTER-PARA.
       END PROGRAM INNER.
       END PROGRAM OUTER.
";
    let (_, result) = ws.analyze(program, &ws.config());
    let lines: Vec<u32> = result
        .diagnostics
        .iter()
        .map(|d| d.locality.start().line)
        .collect();
    assert_eq!(result.diagnostics.len(), 2, "{:?}", result.diagnostics);
    assert!(lines.contains(&3));
    assert!(lines.contains(&7));
    assert!(result
        .diagnostics
        .iter()
        .all(|d| d.code == ErrorCode::UndefinedCodeBlock));
}

#[test]
fn severity_settings_reshape_the_report() {
    let ws = Workspace::new(&[]);
    let mut config = parse_analysis_config(&json!({
        "copybooks": { "processingMode": "disabled" },
        "diagnostics": {
            "processingDisabled": "off",
            "undefinedVariable": "hint"
        }
    }));
    config.copybooks.search_paths = vec![ws.copy_dir()];

    let program = "\
       PROGRAM-ID. MAIN.
       WORKING-STORAGE SECTION.
       COPY CUSTOMER.
       PROCEDURE DIVISION.
       MAIN-PARA.
           DISPLAY CUST-ID.
";
    let (_, result) = ws.analyze(program, &config);
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    assert_eq!(result.diagnostics[0].code, ErrorCode::UndefinedVariable);
    assert_eq!(
        result.diagnostics[0].severity,
        tower_lsp::lsp_types::DiagnosticSeverity::HINT
    );
}
