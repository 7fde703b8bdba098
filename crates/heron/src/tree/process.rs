//
// tree/process.rs
//
// Per-node analysis step, dispatched on the node kind
//

use super::node::{NodeId, NodeKind, NodeType};
use super::registry::CodeBlockKind;
use super::syntax_tree::SyntaxTree;
use crate::diagnostic::Diagnostic;
use crate::locality::Locality;

/// What a node asks of its program's registry
enum Registration {
    CodeBlock {
        name: String,
        kind: CodeBlockKind,
        section: Option<String>,
    },
    CodeBlockUsage(String),
    Variable {
        name: String,
        qualifiers: Vec<String>,
        level: u8,
    },
    VariableUsage {
        name: String,
        qualifiers: Vec<String>,
    },
}

/// Analyze one node, returning the diagnostics it yields right away.
///
/// Declarations and usages register with the nearest enclosing program.
/// Usages answer `None` until that program is finalized, so most
/// unresolved-reference diagnostics surface at program close instead.
pub(crate) fn process(tree: &mut SyntaxTree, id: NodeId) -> Vec<Diagnostic> {
    let Some(node) = tree.get(id) else {
        return Vec::new();
    };
    let locality = node.locality.clone();

    let registration = match &node.kind {
        NodeKind::Root | NodeKind::Program(_) => return Vec::new(),
        NodeKind::Copy(copy) => {
            log::trace!("Copybook {} from {} at {}", copy.name, copy.uri, locality);
            return Vec::new();
        }
        NodeKind::Section(block) => Registration::CodeBlock {
            name: block.name.clone(),
            kind: CodeBlockKind::Section,
            section: None,
        },
        NodeKind::Paragraph(block) => Registration::CodeBlock {
            name: block.name.clone(),
            kind: CodeBlockKind::Paragraph,
            section: enclosing_section(tree, id),
        },
        NodeKind::CodeBlockUsage(usage) => Registration::CodeBlockUsage(usage.name.clone()),
        NodeKind::VariableDefinition(definition) => {
            let variable = definition.variable();
            if !variable.is_referable() {
                return Vec::new();
            }
            Registration::Variable {
                name: variable.name().to_string(),
                qualifiers: definition.qualifiers.clone(),
                level: variable.level(),
            }
        }
        NodeKind::VariableUsage(usage) => Registration::VariableUsage {
            name: usage.name.clone(),
            qualifiers: usage.qualifiers.clone(),
        },
    };

    let Some(program_id) = tree.nearest_ancestor_of_type(id, NodeType::Program) else {
        log::debug!("Node at {} is outside any program; not registered", locality);
        return Vec::new();
    };
    let Some(program) = tree.program_mut(program_id) else {
        return Vec::new();
    };
    let registry = &mut program.registry;

    register(registry, registration, locality, id)
        .into_iter()
        .collect()
}

/// Name of the section a paragraph sits directly in
fn enclosing_section(tree: &SyntaxTree, id: NodeId) -> Option<String> {
    let parent = tree.parent(id)?;
    match &tree.get(parent)?.kind {
        NodeKind::Section(section) => Some(section.name.clone()),
        _ => None,
    }
}

fn register(
    registry: &mut super::registry::ScopeRegistry,
    registration: Registration,
    locality: Locality,
    id: NodeId,
) -> Option<Diagnostic> {
    match registration {
        Registration::CodeBlock {
            name,
            kind,
            section,
        } => registry.register_paragraph_or_section(
            &name,
            kind,
            section.as_deref(),
            locality,
            Some(id),
        ),
        Registration::CodeBlockUsage(name) => registry.register_code_block_usage(&name, locality),
        Registration::Variable {
            name,
            qualifiers,
            level,
        } => registry.register_variable(&name, &qualifiers, level, locality),
        Registration::VariableUsage { name, qualifiers } => {
            registry.register_variable_usage(&name, &qualifiers, locality)
        }
    }
}
