//
// tree/mod.rs
//
// Syntax/semantic tree: arena nodes, the builder that nests parser events
// and the per-program scope registry
//

pub mod builder;
pub mod node;
mod process;
pub mod registry;
pub mod syntax_tree;

pub use builder::{ParseEvent, TreeBuilder};
pub use node::{
    CodeBlockNode, CodeBlockUsageNode, CopyNode, Node, NodeId, NodeKind, NodeType, ProgramNode,
    VariableDefinitionNode, VariableUsageNode,
};
pub use registry::{CodeBlockKind, ScopeRegistry};
pub use syntax_tree::SyntaxTree;
