//
// tree/registry.rs
//
// Per-program declarations and usages, with order-tolerant reconciliation
//
// Usages may precede the declarations they refer to (PERFORM of a paragraph
// declared further down). Until the program's subtree has been fully
// processed, usages are queued; `finalize` checks them against everything
// declared and reports the unresolved ones in usage order. Usages registered
// after `finalize` are answered immediately.
//

use indexmap::IndexMap;
use serde::Serialize;

use super::node::NodeId;
use crate::diagnostic::{Diagnostic, ErrorCode};
use crate::locality::Locality;

/// Paragraph or section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CodeBlockKind {
    Paragraph,
    Section,
}

impl CodeBlockKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Section => "section",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockDeclaration {
    pub name: String,
    pub kind: CodeBlockKind,
    /// Enclosing section of a paragraph
    pub section: Option<String>,
    pub locality: Locality,
    pub node: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclaration {
    pub name: String,
    /// Normalized names of enclosing items, innermost first
    pub qualifiers: Vec<String>,
    pub level: u8,
    pub locality: Locality,
}

#[derive(Debug, Clone)]
enum PendingUsage {
    CodeBlock {
        name: String,
        locality: Locality,
    },
    Variable {
        name: String,
        qualifiers: Vec<String>,
        locality: Locality,
    },
}

/// COBOL words compare case-insensitively
pub fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Declarations and usages of one program
#[derive(Debug)]
pub struct ScopeRegistry {
    program: String,
    /// Sections by name, paragraphs by `NAME OF SECTION` when inside one
    code_blocks: IndexMap<String, CodeBlockDeclaration>,
    /// Keyed by the qualified path, `NAME OF PARENT OF ...`
    variables: IndexMap<String, VariableDeclaration>,
    pending: Vec<PendingUsage>,
    finalized: bool,
}

impl ScopeRegistry {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            code_blocks: IndexMap::new(),
            variables: IndexMap::new(),
            pending: Vec::new(),
            finalized: false,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Declare a paragraph or section. Paragraph names are scoped to their
    /// section, so two sections may each hold a paragraph of the same name.
    /// A second declaration in the same scope is reported at the second site
    /// and does not replace the first.
    pub fn register_paragraph_or_section(
        &mut self,
        name: &str,
        kind: CodeBlockKind,
        section: Option<&str>,
        locality: Locality,
        node: Option<NodeId>,
    ) -> Option<Diagnostic> {
        let section = section.map(normalize);
        let scope = section.as_ref().map(std::slice::from_ref).unwrap_or(&[]);
        let key = qualified_key(&normalize(name), scope);
        if let Some(existing) = self.code_blocks.get(&key) {
            return Some(duplicate(name, existing.kind.as_str(), &existing.locality, locality));
        }
        log::trace!("{}: declared {} {}", self.program, kind.as_str(), key);
        self.code_blocks.insert(
            key,
            CodeBlockDeclaration {
                name: name.to_string(),
                kind,
                section,
                locality,
                node,
            },
        );
        None
    }

    /// Declare a data item under its enclosing items (innermost first).
    /// Items with the same name under different groups are distinct.
    pub fn register_variable(
        &mut self,
        name: &str,
        qualifiers: &[String],
        level: u8,
        locality: Locality,
    ) -> Option<Diagnostic> {
        let qualifiers: Vec<String> = qualifiers.iter().map(|q| normalize(q)).collect();
        let key = qualified_key(&normalize(name), &qualifiers);
        if let Some(existing) = self.variables.get(&key) {
            return Some(duplicate(name, "data item", &existing.locality, locality));
        }
        self.variables.insert(
            key,
            VariableDeclaration {
                name: normalize(name),
                qualifiers,
                level,
                locality,
            },
        );
        None
    }

    /// Record a reference to a paragraph or section.
    ///
    /// Returns `None` while the program is still being processed; the answer
    /// comes from [`finalize`](Self::finalize). Once finalized the usage is
    /// checked on the spot.
    pub fn register_code_block_usage(
        &mut self,
        name: &str,
        locality: Locality,
    ) -> Option<Diagnostic> {
        if self.finalized {
            return self.check_code_block(name, &locality);
        }
        self.pending.push(PendingUsage::CodeBlock {
            name: name.to_string(),
            locality,
        });
        None
    }

    /// Record a reference to a data item, qualifiers innermost first.
    /// Timing follows [`register_code_block_usage`](Self::register_code_block_usage).
    pub fn register_variable_usage(
        &mut self,
        name: &str,
        qualifiers: &[String],
        locality: Locality,
    ) -> Option<Diagnostic> {
        if self.finalized {
            return self.check_variable(name, qualifiers, &locality);
        }
        self.pending.push(PendingUsage::Variable {
            name: name.to_string(),
            qualifiers: qualifiers.to_vec(),
            locality,
        });
        None
    }

    /// Reconcile every queued usage against the declarations, returning the
    /// unresolved ones in the order they were registered.
    pub fn finalize(&mut self) -> Vec<Diagnostic> {
        let pending = std::mem::take(&mut self.pending);
        self.finalized = true;

        let diagnostics: Vec<Diagnostic> = pending
            .iter()
            .filter_map(|usage| match usage {
                PendingUsage::CodeBlock { name, locality } => self.check_code_block(name, locality),
                PendingUsage::Variable {
                    name,
                    qualifiers,
                    locality,
                } => self.check_variable(name, qualifiers, locality),
            })
            .collect();

        log::debug!(
            "Finalized program {}: {} code block(s), {} data item(s), {} usage(s), {} unresolved",
            self.program,
            self.code_blocks.len(),
            self.variables.len(),
            pending.len(),
            diagnostics.len()
        );
        diagnostics
    }

    /// First declaration named `name`, in any section
    pub fn code_block(&self, name: &str) -> Option<&CodeBlockDeclaration> {
        let name = normalize(name);
        self.code_blocks
            .values()
            .find(|decl| normalize(&decl.name) == name)
    }

    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlockDeclaration> {
        self.code_blocks.values()
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableDeclaration> {
        self.variables.values()
    }

    /// Declarations matching a possibly qualified reference. Qualifiers must
    /// appear among the item's enclosing names in the same order, not
    /// necessarily adjacent.
    pub fn lookup_variable(&self, name: &str, qualifiers: &[String]) -> Vec<&VariableDeclaration> {
        let name = normalize(name);
        let qualifiers: Vec<String> = qualifiers.iter().map(|q| normalize(q)).collect();
        self.variables
            .values()
            .filter(|decl| decl.name == name && is_subsequence(&qualifiers, &decl.qualifiers))
            .collect()
    }

    fn check_code_block(&self, name: &str, locality: &Locality) -> Option<Diagnostic> {
        if self.code_block(name).is_some() {
            return None;
        }
        let code = ErrorCode::UndefinedCodeBlock;
        Some(Diagnostic::new(
            locality.clone(),
            code.default_severity(),
            code,
            format!("There is an issue with PERFORM or GO TO: {} is not defined", name),
        ))
    }

    fn check_variable(
        &self,
        name: &str,
        qualifiers: &[String],
        locality: &Locality,
    ) -> Option<Diagnostic> {
        if !self.lookup_variable(name, qualifiers).is_empty() {
            return None;
        }
        let code = ErrorCode::UndefinedVariable;
        let reference = std::iter::once(name)
            .chain(qualifiers.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" OF ");
        Some(Diagnostic::new(
            locality.clone(),
            code.default_severity(),
            code,
            format!("Variable {} is not defined", reference),
        ))
    }
}

fn qualified_key(name: &str, qualifiers: &[String]) -> String {
    std::iter::once(name)
        .chain(qualifiers.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" OF ")
}

fn is_subsequence(needle: &[String], haystack: &[String]) -> bool {
    let mut remaining = haystack.iter();
    needle.iter().all(|n| remaining.any(|h| h == n))
}

fn duplicate(name: &str, what: &str, first: &Locality, second: Locality) -> Diagnostic {
    let code = ErrorCode::DuplicateDeclaration;
    Diagnostic::new(
        second,
        code.default_severity(),
        code,
        format!("{} {} is already defined at {}", what, name, first),
    )
}
