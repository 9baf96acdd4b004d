//! Arena-backed result forest rooted at a single `RootNode`.
//!
//! Nodes own their children through `NodeId` lists; there are no parent links,
//! so lookups always walk downward from the root. At most one folder exists per
//! normalized directory path and one file per normalized file path.

use super::{DiagnosticNode, FileNode, FolderNode, ResultNode, RootNode, Severity, Summary};
use crate::path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Stable handle to a node inside one [`ResultTree`].
pub struct NodeId(usize);

pub const ROOT_LABEL: &str = "ROOT";

#[derive(Debug, Clone)]
pub struct ResultTree {
    nodes: Vec<ResultNode>,
}

impl Default for ResultTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![ResultNode::Root(RootNode {
                label: ROOT_LABEL.to_string(),
                children: Vec::new(),
            })],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &ResultNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    /// Drop every node except the root.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root()).is_empty()
    }

    /// Pre-order traversal starting at `from`.
    pub fn walk(&self, from: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![from];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.children(id).iter().rev().copied());
            Some(id)
        })
    }

    /// Depth-first search for the file node whose path equals `file_path`.
    pub fn find_file(&self, file_path: &str) -> Option<NodeId> {
        let wanted = path::normalize(file_path);
        self.walk(self.root())
            .find(|id| matches!(self.node(*id), ResultNode::File(f) if f.file_path == wanted))
    }

    /// Depth-first search for the folder node whose path equals `directory_path`.
    pub fn find_folder(&self, directory_path: &str) -> Option<NodeId> {
        let wanted = path::normalize(directory_path);
        self.walk(self.root()).find(
            |id| matches!(self.node(*id), ResultNode::Folder(f) if f.directory_path == wanted),
        )
    }

    /// Resolve the folder chain for `directory_path`, creating missing segments.
    ///
    /// Once a prefix is missing every deeper prefix is created without searching,
    /// since folders are only ever built top-down.
    pub fn ensure_folder(&mut self, directory_path: &str) -> NodeId {
        let norm = path::normalize(directory_path);
        let mut prefix = String::new();
        let mut last = self.root();
        let mut searching = true;
        for segment in norm.split('/') {
            if segment.is_empty() {
                // leading slash of an absolute unix path
                if prefix.is_empty() {
                    prefix.push('/');
                }
                continue;
            }
            if !prefix.is_empty() && !prefix.ends_with('/') {
                prefix.push('/');
            }
            prefix.push_str(segment);
            if searching {
                if let Some(found) = self.find_folder(&prefix) {
                    last = found;
                    continue;
                }
                searching = false;
            }
            let folder = ResultNode::Folder(FolderNode {
                directory_path: prefix.clone(),
                label: segment.to_string(),
                children: Vec::new(),
            });
            last = self.attach(last, folder);
        }
        last
    }

    /// Find the file node for `file_path` or create it under its folder chain.
    pub fn ensure_file(&mut self, file_path: &str) -> NodeId {
        if let Some(found) = self.find_file(file_path) {
            return found;
        }
        let file_path = path::normalize(file_path);
        let directory_path = path::directory_of(&file_path);
        let parent = if directory_path.is_empty() {
            self.root()
        } else {
            self.ensure_folder(&directory_path)
        };
        let file = ResultNode::File(FileNode {
            label: path::base_name_of(&file_path),
            file_path,
            directory_path,
            children: Vec::new(),
        });
        self.attach(parent, file)
    }

    /// Append a diagnostic to `file`. Returns `None` if `file` is not a file node.
    pub fn insert_diagnostic(
        &mut self,
        file: NodeId,
        severity: Severity,
        diagnostic: DiagnosticNode,
    ) -> Option<NodeId> {
        if !matches!(self.node(file), ResultNode::File(_)) {
            return None;
        }
        let node = match severity {
            Severity::Error => ResultNode::Error(diagnostic),
            Severity::Warning => ResultNode::Warning(diagnostic),
        };
        Some(self.attach(file, node))
    }

    fn attach(&mut self, parent: NodeId, node: ResultNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        if let Some(children) = self.nodes[parent.0].children_mut() {
            children.push(id);
        }
        id
    }

    /// Whether a file node holds at least one error (otherwise warnings only).
    pub fn file_has_error(&self, file: NodeId) -> bool {
        self.children(file)
            .iter()
            .any(|c| matches!(self.node(*c), ResultNode::Error(_)))
    }

    /// Newline-joined diagnostic text of the subtree under `id`.
    ///
    /// A file contributes its diagnostics' messages; any other node concatenates
    /// its children's text. Empty parts are skipped.
    pub fn aggregate_text(&self, id: NodeId) -> String {
        let parts: Vec<String> = match self.node(id) {
            ResultNode::File(f) => f
                .children
                .iter()
                .map(|c| self.node(*c).label().to_string())
                .collect(),
            ResultNode::Error(d) | ResultNode::Warning(d) => vec![d.message.clone()],
            other => other
                .children()
                .iter()
                .map(|c| self.aggregate_text(*c))
                .collect(),
        };
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Locate a file or folder by path, files first.
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        self.find_file(path).or_else(|| self.find_folder(path))
    }

    /// Count errors, warnings and files in the whole tree.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for node in &self.nodes {
            match node {
                ResultNode::File(_) => summary.files += 1,
                ResultNode::Error(_) => summary.errors += 1,
                ResultNode::Warning(_) => summary.warnings += 1,
                _ => {}
            }
        }
        summary
    }
}
