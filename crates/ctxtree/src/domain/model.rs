//! Domain models for the selection tree.

use std::fmt;

use serde::Serialize;

/// Stable index of a node inside one tree generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    File,
    Directory,
}

impl NodeKind {
    pub fn is_dir(self) -> bool {
        matches!(self, NodeKind::Directory)
    }
}

/// One path segment of the selection tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) relative_path: String,
    pub(crate) kind: NodeKind,
    pub(crate) selected: bool,
    pub(crate) children: Option<Vec<NodeId>>,
    pub(crate) parent: Option<NodeId>,
}

impl Node {
    pub(crate) fn new(
        name: &str,
        relative_path: String,
        kind: NodeKind,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            relative_path,
            kind,
            selected: false,
            children: kind.is_dir().then(Vec::new),
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Whether the node is selected. Only authoritative for files; a directory's flag is advisory.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids in display order. Files and directories whose children were invalidated yield an
    /// empty slice.
    pub fn children(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// A relative path paired with its classification, as produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassifiedPath {
    pub path: String,
    pub kind: NodeKind,
}

impl ClassifiedPath {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::File,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::Directory,
        }
    }
}

/// Display state of a node derived from the files beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckState {
    Checked,
    Unchecked,
    Partial,
}

impl CheckState {
    pub fn marker(self) -> &'static str {
        match self {
            CheckState::Checked => "[x]",
            CheckState::Unchecked => "[ ]",
            CheckState::Partial => "[~]",
        }
    }
}

/// Granularity of a tree change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    /// The whole tree was replaced or every node changed.
    Tree,
    /// Only the subtree rooted at this node changed.
    Subtree(NodeId),
}

/// Notification delivered to observers after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeChange {
    pub generation: u64,
    pub scope: ChangeScope,
}
