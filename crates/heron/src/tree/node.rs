//
// tree/node.rs
//
// Node handles, node types and the per-kind payloads stored in the arena
//

use std::fmt;

use serde::Serialize;

use super::registry::ScopeRegistry;
use crate::copybook::name::CopybookName;
use crate::locality::Locality;
use crate::variables::{Variable, VariableKind};

/// Handle of a node inside its [`SyntaxTree`](super::SyntaxTree)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Closed set of node types, fixed when a node is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeType {
    Root,
    Program,
    Section,
    Paragraph,
    CodeBlockUsage,
    VariableDefinition,
    VariableUsage,
    Copy,
}

/// A program: its name and the scope registry its descendants report to
#[derive(Debug)]
pub struct ProgramNode {
    pub name: String,
    pub registry: ScopeRegistry,
}

impl ProgramNode {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            registry: ScopeRegistry::new(name.clone()),
            name,
        }
    }
}

/// A paragraph or section declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockNode {
    pub name: String,
}

/// A reference to a paragraph or section (`PERFORM X`, `GO TO X`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockUsageNode {
    pub name: String,
}

/// A data item declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinitionNode {
    pub variable: VariableKind,
    /// Names of enclosing items, innermost first
    pub qualifiers: Vec<String>,
}

impl VariableDefinitionNode {
    pub fn variable(&self) -> &dyn Variable {
        self.variable.as_variable()
    }
}

/// A reference to a data item, `NAME [OF|IN qualifier]...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableUsageNode {
    pub name: String,
    /// Qualifiers as written, innermost first
    pub qualifiers: Vec<String>,
}

/// A copybook spliced into the analyzed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyNode {
    pub name: CopybookName,
    pub uri: String,
}

/// Payload of a node; its variant determines the node type
#[derive(Debug)]
pub enum NodeKind {
    Root,
    Program(ProgramNode),
    Section(CodeBlockNode),
    Paragraph(CodeBlockNode),
    CodeBlockUsage(CodeBlockUsageNode),
    VariableDefinition(VariableDefinitionNode),
    VariableUsage(VariableUsageNode),
    Copy(CopyNode),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Root => NodeType::Root,
            Self::Program(_) => NodeType::Program,
            Self::Section(_) => NodeType::Section,
            Self::Paragraph(_) => NodeType::Paragraph,
            Self::CodeBlockUsage(_) => NodeType::CodeBlockUsage,
            Self::VariableDefinition(_) => NodeType::VariableDefinition,
            Self::VariableUsage(_) => NodeType::VariableUsage,
            Self::Copy(_) => NodeType::Copy,
        }
    }

    /// Name carried by the node, if its kind has one
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Program(p) => Some(&p.name),
            Self::Section(b) | Self::Paragraph(b) => Some(&b.name),
            Self::CodeBlockUsage(u) => Some(&u.name),
            Self::VariableDefinition(d) => Some(d.variable().name()),
            Self::VariableUsage(u) => Some(&u.name),
            Self::Copy(c) => Some(c.name.display_name()),
        }
    }
}

/// Arena entry. The kind is fixed at construction; only its payload may
/// change afterwards (see [`SyntaxTree::program_mut`](super::SyntaxTree::program_mut)).
#[derive(Debug)]
pub struct Node {
    pub locality: Locality,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether nodes may be attached below this one
    pub fn accepts_children(&self, child: &NodeKind) -> bool {
        match (&self.kind, child) {
            (NodeKind::VariableDefinition(def), NodeKind::VariableDefinition(sub)) => def
                .variable()
                .accepts_child(sub.variable().level()),
            (NodeKind::VariableDefinition(_), _) => false,
            (NodeKind::CodeBlockUsage(_), _)
            | (NodeKind::VariableUsage(_), _)
            | (NodeKind::Copy(_), _) => false,
            _ => true,
        }
    }
}
