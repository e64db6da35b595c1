//! Tree capability interface
//!
//! The engine never owns document nodes. Hosts hand out opaque `NodeId`
//! handles and perform the structural edits on request. Handles are only
//! trusted for the duration of one operation; `contains` tells whether a
//! handle still refers to an attached node.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::error::TreeError;

pub use memory::MemoryTree;

/// Opaque host-provided node handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with its tag name
    Element(String),
    /// Character data with its current content
    Text(String),
}

/// Wrapper element the host inserts around a matched span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapperSpec {
    pub id: String,
    pub text: String,
    pub mode: Mode,
    /// Presentational color, highlight mode only
    pub color: Option<String>,
    /// Whether the host should wire an interaction that removes it
    pub removable: bool,
}

/// One piece of the replacement run for a text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Segment {
    Text { text: String },
    Wrapper(WrapperSpec),
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Text { text } => text,
            Segment::Wrapper(spec) => &spec.text,
        }
    }
}

/// Operations the engine needs from the document host
pub trait TreeSource {
    fn root(&self) -> NodeId;

    /// Whether the handle refers to a node still attached under `root`
    fn contains(&self, node: NodeId) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child handles in document order
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn kind(&self, node: NodeId) -> Option<NodeKind>;

    /// Annotation id when the node is an annotation wrapper
    fn annotation_id(&self, node: NodeId) -> Option<String>;

    /// Version stamp of a node; changes whenever its text content changes
    fn revision(&self, node: NodeId) -> u64;

    /// Replace one text node by the given run of segments, atomically.
    /// Returns the new node handles in segment order.
    fn replace_text(&mut self, node: NodeId, segments: &[Segment]) -> Result<Vec<NodeId>, TreeError>;

    /// Locate the wrapper carrying `id`
    fn find_annotation(&self, id: &str) -> Option<NodeId>;

    /// Replace a wrapper by a plain text node holding `text`. Hosts may merge
    /// the result with adjacent text; the returned handle is the text node
    /// that now contains it.
    fn unwrap_annotation(&mut self, wrapper: NodeId, text: &str) -> Result<NodeId, TreeError>;

    fn is_text(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Text(_)))
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match self.kind(node) {
            Some(NodeKind::Element(tag)) => Some(tag),
            _ => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<String> {
        match self.kind(node) {
            Some(NodeKind::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// True when `node` or any ancestor is an annotation wrapper
    fn within_annotation(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.annotation_id(n).is_some() {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// True when `ancestor` is `node` or one of its ancestors
    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Concatenated text of the subtree in document order
    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            match self.kind(n) {
                Some(NodeKind::Text(text)) => out.push_str(&text),
                Some(NodeKind::Element(_)) => {
                    stack.extend(self.children(n).into_iter().rev());
                }
                None => {}
            }
        }
        out
    }
}
