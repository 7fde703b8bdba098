//
// tree/syntax_tree.rs
//
// Arena-backed tree of analysis nodes
//

use super::node::{Node, NodeId, NodeKind, NodeType, ProgramNode};
use super::process::process;
use crate::diagnostic::Diagnostic;
use crate::locality::Locality;
use crate::perf::TimingGuard;

/// All nodes of one compilation unit. Nodes refer to each other by
/// [`NodeId`]; the root is always present.
#[derive(Debug)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn new(uri: &str) -> Self {
        Self {
            nodes: vec![Node {
                locality: Locality::point(uri, 0, 0),
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::from_raw(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Attach a new node as the last child of `parent`.
    ///
    /// Attaching below a node that cannot have children (a usage, or a data
    /// item that does not accept that level) is a caller error.
    pub fn add_child(&mut self, parent: NodeId, locality: Locality, kind: NodeKind) -> NodeId {
        debug_assert!(
            self.get(parent)
                .map(|p| p.accepts_children(&kind))
                .unwrap_or(false),
            "cannot attach {:?} below {:?}",
            kind.node_type(),
            self.get(parent).map(Node::node_type)
        );
        let id = NodeId::from_raw(self.nodes.len() as u32);
        self.nodes.push(Node {
            locality,
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(p) = self.nodes.get_mut(parent.index()) {
            p.children.push(id);
        }
        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Iterator over the strict ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&current| self.parent(current))
    }

    /// The closest strict ancestor of type `ty`. The node itself is never
    /// returned, so the root and nodes with no such ancestor give `None`.
    pub fn nearest_ancestor_of_type(&self, id: NodeId, ty: NodeType) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&ancestor| self.nodes[ancestor.index()].node_type() == ty)
    }

    pub fn program(&self, id: NodeId) -> Option<&ProgramNode> {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Program(program)) => Some(program),
            _ => None,
        }
    }

    pub fn program_mut(&mut self, id: NodeId) -> Option<&mut ProgramNode> {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Program(program)) => Some(program),
            _ => None,
        }
    }

    /// Every node of type `ty`, in depth-first pre-order
    pub fn nodes_of_type(&self, ty: NodeType) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.nodes[id.index()].node_type() == ty)
            .collect()
    }

    /// Node ids in depth-first pre-order from the root
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Run `process()` over every node in depth-first pre-order.
    ///
    /// Each node's diagnostics are appended as it is visited. When a program's
    /// subtree has been visited its registry is finalized and the deferred
    /// diagnostics are appended at that point.
    pub fn analyze(&mut self) -> Vec<Diagnostic> {
        let _timer = TimingGuard::new("tree_analyze");

        enum Visit {
            Enter(NodeId),
            CloseProgram(NodeId),
        }

        let mut diagnostics = Vec::new();
        let mut stack = vec![Visit::Enter(self.root())];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(id) => {
                    diagnostics.extend(process(self, id));
                    if self.nodes[id.index()].node_type() == NodeType::Program {
                        stack.push(Visit::CloseProgram(id));
                    }
                    stack.extend(self.children(id).iter().rev().map(|&c| Visit::Enter(c)));
                }
                Visit::CloseProgram(id) => {
                    if let Some(program) = self.program_mut(id) {
                        diagnostics.extend(program.registry.finalize());
                    }
                }
            }
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::{CodeBlockNode, CodeBlockUsageNode};

    const URI: &str = "file:///PROG.cbl";

    fn at(line: u32) -> Locality {
        Locality::point(URI, line, 7)
    }

    fn paragraph(name: &str) -> NodeKind {
        NodeKind::Paragraph(CodeBlockNode {
            name: name.to_string(),
        })
    }

    fn usage(name: &str) -> NodeKind {
        NodeKind::CodeBlockUsage(CodeBlockUsageNode {
            name: name.to_string(),
        })
    }

    #[test]
    fn test_nearest_ancestor_excludes_self() {
        let mut tree = SyntaxTree::new(URI);
        let root = tree.root();
        let outer = tree.add_child(root, at(0), NodeKind::Program(ProgramNode::new("OUTER")));
        let inner = tree.add_child(outer, at(5), NodeKind::Program(ProgramNode::new("INNER")));
        let para = tree.add_child(inner, at(6), paragraph("P"));

        assert_eq!(tree.nearest_ancestor_of_type(para, NodeType::Program), Some(inner));
        assert_eq!(tree.nearest_ancestor_of_type(inner, NodeType::Program), Some(outer));
        assert_eq!(tree.nearest_ancestor_of_type(outer, NodeType::Program), None);
        assert_eq!(tree.nearest_ancestor_of_type(root, NodeType::Root), None);
        assert_eq!(tree.nearest_ancestor_of_type(para, NodeType::Section), None);
        assert_eq!(tree.nearest_ancestor_of_type(para, NodeType::Root), Some(root));
    }

    #[test]
    fn test_preorder() {
        let mut tree = SyntaxTree::new(URI);
        let root = tree.root();
        let program = tree.add_child(root, at(0), NodeKind::Program(ProgramNode::new("P")));
        let a = tree.add_child(program, at(1), paragraph("A"));
        let a_use = tree.add_child(a, at(2), usage("B"));
        let b = tree.add_child(program, at(3), paragraph("B"));

        assert_eq!(tree.preorder(), vec![root, program, a, a_use, b]);
        assert_eq!(tree.nodes_of_type(NodeType::Paragraph), vec![a, b]);
        assert_eq!(tree.ancestors(a_use).collect::<Vec<_>>(), vec![a, program, root]);
    }

    #[test]
    fn test_forward_usage_resolves_at_program_close() {
        let mut tree = SyntaxTree::new(URI);
        let root = tree.root();
        let program = tree.add_child(root, at(0), NodeKind::Program(ProgramNode::new("P")));
        let a = tree.add_child(program, at(1), paragraph("A"));
        tree.add_child(a, at(2), usage("B"));
        tree.add_child(a, at(3), usage("C"));
        tree.add_child(program, at(4), paragraph("B"));

        let diagnostics = tree.analyze();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].locality, at(3));
        assert!(tree.program(program).unwrap().registry.is_finalized());
    }

    #[test]
    fn test_payload_changes_keep_node_type() {
        let mut tree = SyntaxTree::new(URI);
        let root = tree.root();
        let program = tree.add_child(root, at(0), NodeKind::Program(ProgramNode::new("OLD")));

        tree.program_mut(program).unwrap().name = "NEW".to_string();
        tree.get_mut(program).unwrap().locality = at(2);

        let node = tree.get(program).unwrap();
        assert_eq!(node.node_type(), NodeType::Program);
        assert_eq!(node.kind().name(), Some("NEW"));
        assert_eq!(node.locality, at(2));
    }

    #[test]
    fn test_same_paragraph_in_two_sections() {
        let section = |name: &str| {
            NodeKind::Section(CodeBlockNode {
                name: name.to_string(),
            })
        };
        let mut tree = SyntaxTree::new(URI);
        let root = tree.root();
        let program = tree.add_child(root, at(0), NodeKind::Program(ProgramNode::new("P")));
        let read = tree.add_child(program, at(1), section("READ-S"));
        tree.add_child(read, at(2), usage("EXIT-PARA"));
        tree.add_child(read, at(3), paragraph("EXIT-PARA"));
        let write = tree.add_child(program, at(4), section("WRITE-S"));
        tree.add_child(write, at(5), paragraph("EXIT-PARA"));
        tree.add_child(write, at(6), paragraph("EXIT-PARA"));

        let diagnostics = tree.analyze();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, crate::diagnostic::ErrorCode::DuplicateDeclaration);
        assert_eq!(diagnostics[0].locality, at(6));
    }

    #[test]
    fn test_usage_outside_program_is_silent() {
        let mut tree = SyntaxTree::new(URI);
        let root = tree.root();
        tree.add_child(root, at(1), usage("NOWHERE"));
        assert!(tree.analyze().is_empty());
    }
}
