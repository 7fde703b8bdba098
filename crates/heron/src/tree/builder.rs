//
// tree/builder.rs
//
// Builds a SyntaxTree from the flat event stream a parser produces
//
// The parser reports what it sees in source order; the builder supplies the
// nesting COBOL leaves implicit: a paragraph ends where the next paragraph or
// section begins, and data items nest by level number.
//

use serde::Serialize;

use super::node::{
    CodeBlockNode, CodeBlockUsageNode, CopyNode, NodeId, NodeKind, ProgramNode,
    VariableDefinitionNode, VariableUsageNode,
};
use super::syntax_tree::SyntaxTree;
use crate::copybook::name::CopybookName;
use crate::copybook::resolver::CopybookUsage;
use crate::copybook::source_map::SourceMap;
use crate::locality::Locality;
use crate::variables::{Variable, VariableKind, LEVEL_CONDITION, LEVEL_INDEPENDENT, LEVEL_RENAMES};

/// One syntactic fact reported by a parser, in source order. Localities are
/// in the coordinates of the text that was parsed (the expanded text when
/// copybooks were expanded).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ParseEvent {
    StartProgram {
        name: String,
        locality: Locality,
    },
    EndProgram,
    Section {
        name: String,
        locality: Locality,
    },
    Paragraph {
        name: String,
        locality: Locality,
    },
    CodeBlockUsage {
        name: String,
        locality: Locality,
    },
    DataItem {
        level: u8,
        /// `None` for unnamed items
        name: Option<String>,
        pic: Option<String>,
        value: Option<String>,
        locality: Locality,
    },
    VariableUsage {
        name: String,
        /// Qualifiers as written, innermost first
        qualifiers: Vec<String>,
        locality: Locality,
    },
    Copy {
        name: String,
        uri: String,
        locality: Locality,
    },
}

#[derive(Debug, Clone)]
struct OpenItem {
    level: u8,
    node: NodeId,
    name: Option<String>,
    is_group: bool,
}

/// Open containers of one program
#[derive(Debug)]
struct ProgramFrame {
    program: NodeId,
    section: Option<NodeId>,
    paragraph: Option<NodeId>,
    items: Vec<OpenItem>,
    /// Owner of subsequent level-88 entries
    last_item: Option<OpenItem>,
}

impl ProgramFrame {
    fn new(program: NodeId) -> Self {
        Self {
            program,
            section: None,
            paragraph: None,
            items: Vec::new(),
            last_item: None,
        }
    }
}

/// Incremental tree construction from [`ParseEvent`]s
pub struct TreeBuilder<'m> {
    tree: SyntaxTree,
    source_map: Option<&'m SourceMap>,
    frames: Vec<ProgramFrame>,
}

impl<'m> TreeBuilder<'m> {
    pub fn new(uri: &str) -> Self {
        Self {
            tree: SyntaxTree::new(uri),
            source_map: None,
            frames: Vec::new(),
        }
    }

    /// Remap every locality through `source_map` as nodes are created
    pub fn with_source_map(mut self, source_map: &'m SourceMap) -> Self {
        self.source_map = Some(source_map);
        self
    }

    fn remap(&self, locality: Locality) -> Locality {
        match self.source_map {
            Some(map) => map.remap(&locality),
            None => locality,
        }
    }

    fn frame(&mut self) -> Option<&mut ProgramFrame> {
        self.frames.last_mut()
    }

    /// Where statements and usages attach: the open paragraph, else the open
    /// section, else the program, else the root.
    fn statement_parent(&self) -> NodeId {
        match self.frames.last() {
            Some(frame) => frame.paragraph.or(frame.section).unwrap_or(frame.program),
            None => self.tree.root(),
        }
    }

    fn container(&self) -> NodeId {
        self.frames
            .last()
            .map(|f| f.program)
            .unwrap_or_else(|| self.tree.root())
    }

    pub fn push(&mut self, event: ParseEvent) {
        match event {
            ParseEvent::StartProgram { name, locality } => {
                let parent = self.container();
                if let Some(frame) = self.frame() {
                    frame.section = None;
                    frame.paragraph = None;
                    frame.items.clear();
                    frame.last_item = None;
                }
                let locality = self.remap(locality);
                let id = self
                    .tree
                    .add_child(parent, locality, NodeKind::Program(ProgramNode::new(name)));
                self.frames.push(ProgramFrame::new(id));
            }
            ParseEvent::EndProgram => {
                if self.frames.pop().is_none() {
                    log::warn!("END PROGRAM without an open program");
                }
            }
            ParseEvent::Section { name, locality } => {
                let parent = self.container();
                let locality = self.remap(locality);
                let id = self
                    .tree
                    .add_child(parent, locality, NodeKind::Section(CodeBlockNode { name }));
                if let Some(frame) = self.frame() {
                    frame.section = Some(id);
                    frame.paragraph = None;
                    frame.items.clear();
                }
            }
            ParseEvent::Paragraph { name, locality } => {
                let parent = self
                    .frames
                    .last()
                    .and_then(|f| f.section)
                    .unwrap_or_else(|| self.container());
                let locality = self.remap(locality);
                let id = self
                    .tree
                    .add_child(parent, locality, NodeKind::Paragraph(CodeBlockNode { name }));
                if let Some(frame) = self.frame() {
                    frame.paragraph = Some(id);
                    frame.items.clear();
                }
            }
            ParseEvent::CodeBlockUsage { name, locality } => {
                let parent = self.statement_parent();
                let locality = self.remap(locality);
                self.tree.add_child(
                    parent,
                    locality,
                    NodeKind::CodeBlockUsage(CodeBlockUsageNode { name }),
                );
            }
            ParseEvent::VariableUsage {
                name,
                qualifiers,
                locality,
            } => {
                let parent = self.statement_parent();
                let locality = self.remap(locality);
                self.tree.add_child(
                    parent,
                    locality,
                    NodeKind::VariableUsage(VariableUsageNode { name, qualifiers }),
                );
            }
            ParseEvent::Copy {
                name,
                uri,
                locality,
            } => {
                let parent = self.statement_parent();
                let locality = self.remap(locality);
                self.tree.add_child(
                    parent,
                    locality,
                    NodeKind::Copy(CopyNode {
                        name: CopybookName::new(name),
                        uri,
                    }),
                );
            }
            ParseEvent::DataItem {
                level,
                name,
                pic,
                value,
                locality,
            } => self.push_data_item(level, name, pic, value, locality),
        }
    }

    fn push_data_item(
        &mut self,
        level: u8,
        name: Option<String>,
        pic: Option<String>,
        value: Option<String>,
        locality: Locality,
    ) {
        let locality = self.remap(locality);
        let program = self.container();
        let variable = VariableKind::classify(
            level,
            name.clone().unwrap_or_default(),
            pic,
            value,
            locality.clone(),
        );
        let is_group = variable.as_variable().is_structure();

        let Some(frame) = self.frames.last_mut() else {
            let qualifiers = Vec::new();
            self.tree.add_child(
                program,
                locality,
                NodeKind::VariableDefinition(VariableDefinitionNode { variable, qualifiers }),
            );
            return;
        };
        frame.section = None;
        frame.paragraph = None;

        let (parent, qualifiers) = match level {
            LEVEL_CONDITION => match &frame.last_item {
                // Condition names of a 77 item sit beside it, qualified by it
                Some(owner) if owner.level == LEVEL_INDEPENDENT => {
                    (program, owner.name.iter().cloned().collect())
                }
                Some(owner) => {
                    let owner = owner.clone();
                    (owner.node, qualifiers_of(&frame.items, Some(&owner)))
                }
                None => (program, Vec::new()),
            },
            1 | LEVEL_INDEPENDENT | LEVEL_RENAMES => {
                frame.items.clear();
                (program, Vec::new())
            }
            _ => {
                while frame
                    .items
                    .last()
                    .map(|top| top.level >= level || level > 49 || !top.is_group)
                    .unwrap_or(false)
                {
                    frame.items.pop();
                }
                let parent = frame.items.last().map(|top| top.node).unwrap_or(program);
                (parent, qualifiers_of(&frame.items, None))
            }
        };

        let id = self.tree.add_child(
            parent,
            locality,
            NodeKind::VariableDefinition(VariableDefinitionNode { variable, qualifiers }),
        );

        if level == LEVEL_CONDITION {
            return;
        }
        let item = OpenItem {
            level,
            node: id,
            name,
            is_group,
        };
        if let Some(frame) = self.frames.last_mut() {
            if level != LEVEL_INDEPENDENT && level != LEVEL_RENAMES {
                frame.items.push(item.clone());
            }
            frame.last_item = Some(item);
        }
    }

    /// Attach a node for each copybook spliced directly into the document
    pub fn add_copybooks(&mut self, copybooks: &[CopybookUsage]) {
        let root = self.tree.root();
        for usage in copybooks.iter().filter(|u| u.depth == 1) {
            self.tree.add_child(
                root,
                usage.locality.clone(),
                NodeKind::Copy(CopyNode {
                    name: usage.name.clone(),
                    uri: usage.uri.clone(),
                }),
            );
        }
    }

    pub fn finish(self) -> SyntaxTree {
        if !self.frames.is_empty() {
            log::debug!("{} program(s) not explicitly ended", self.frames.len());
        }
        self.tree
    }
}

/// Names of the open items enclosing a new entry, innermost first. With
/// `owner`, the owner itself comes first and the items above it follow.
fn qualifiers_of(items: &[OpenItem], owner: Option<&OpenItem>) -> Vec<String> {
    let upto = match owner {
        Some(owner) => items
            .iter()
            .position(|i| i.node == owner.node)
            .map(|p| p + 1)
            .unwrap_or(0),
        None => items.len(),
    };
    let mut names: Vec<String> = items[..upto]
        .iter()
        .rev()
        .filter_map(|i| i.name.clone())
        .filter(|n| !n.eq_ignore_ascii_case(crate::variables::FILLER))
        .collect();
    if let Some(owner) = owner {
        if upto == 0 {
            names.extend(owner.name.clone());
        }
    }
    names
}
