//! Result data model: node variants, severity and run summaries.

pub mod tree;

pub use tree::{NodeId, ResultTree};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
/// Severity of a positioned diagnostic.
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Top-level container; its children are folders (or files with no directory).
pub struct RootNode {
    pub label: String,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One directory segment. `label` is the last segment of `directory_path`.
pub struct FolderNode {
    pub directory_path: String,
    pub label: String,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One analyzed source file; children are its diagnostics in first-seen order.
pub struct FileNode {
    pub file_path: String,
    pub directory_path: String,
    pub label: String,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A positioned diagnostic. `message` doubles as label and dedup key.
pub struct DiagnosticNode {
    pub file_path: String,
    pub line: u64,
    pub column: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Closed set of node kinds stored in a [`ResultTree`].
pub enum ResultNode {
    Root(RootNode),
    Folder(FolderNode),
    File(FileNode),
    Error(DiagnosticNode),
    Warning(DiagnosticNode),
}

impl ResultNode {
    pub fn label(&self) -> &str {
        match self {
            ResultNode::Root(n) => &n.label,
            ResultNode::Folder(n) => &n.label,
            ResultNode::File(n) => &n.label,
            ResultNode::Error(d) | ResultNode::Warning(d) => &d.message,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            ResultNode::Root(n) => &n.children,
            ResultNode::Folder(n) => &n.children,
            ResultNode::File(n) => &n.children,
            ResultNode::Error(_) | ResultNode::Warning(_) => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            ResultNode::Root(n) => Some(&mut n.children),
            ResultNode::Folder(n) => Some(&mut n.children),
            ResultNode::File(n) => Some(&mut n.children),
            ResultNode::Error(_) | ResultNode::Warning(_) => None,
        }
    }

    pub fn as_diagnostic(&self) -> Option<(&DiagnosticNode, Severity)> {
        match self {
            ResultNode::Error(d) => Some((d, Severity::Error)),
            ResultNode::Warning(d) => Some((d, Severity::Warning)),
            _ => None,
        }
    }

    /// Short lowercase tag used by printers.
    pub fn kind(&self) -> &'static str {
        match self {
            ResultNode::Root(_) => "root",
            ResultNode::Folder(_) => "folder",
            ResultNode::File(_) => "file",
            ResultNode::Error(_) => "error",
            ResultNode::Warning(_) => "warning",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Aggregated counts used by printers and exit codes.
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub files: usize,
    pub command_errors: usize,
}
