//! MemoryTree: arena-backed document tree
//!
//! A small element/text tree addressed by `NodeId` indices. Used by native
//! hosts and by the test-suite as a stand-in for the page DOM. Detached nodes
//! stay in the arena (handles are never reused) but report `contains = false`.

use std::collections::HashSet;

use super::{NodeId, NodeKind, Segment, TreeSource, WrapperSpec};
use crate::config::Mode;
use crate::error::TreeError;

/// Tag used for wrapper elements
pub const WRAPPER_TAG: &str = "span";

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        annotation: Option<WrapperSpec>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
    revision: u64,
}

#[derive(Debug, Clone)]
pub struct MemoryTree {
    slots: Vec<Slot>,
    root: NodeId,
    next_revision: u64,
    /// Nodes whose edits fail, simulating interference from page scripts
    frozen: HashSet<NodeId>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Create a tree holding a single `body` element
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            root: NodeId(0),
            next_revision: 1,
            frozen: HashSet::new(),
        };
        tree.root = tree.alloc(None, NodeData::Element {
            tag: "body".to_string(),
            annotation: None,
        });
        tree
    }

    fn alloc(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        let revision = self.bump_revision();
        self.slots.push(Slot {
            parent,
            children: Vec::new(),
            data,
            revision,
        });
        id
    }

    fn bump_revision(&mut self) -> u64 {
        let revision = self.next_revision;
        self.next_revision += 1;
        revision
    }

    fn slot(&self, node: NodeId) -> Option<&Slot> {
        self.slots.get(node.0 as usize)
    }

    fn slot_mut(&mut self, node: NodeId) -> Option<&mut Slot> {
        self.slots.get_mut(node.0 as usize)
    }

    // -------------------------------------------------------------------------
    // Builder API
    // -------------------------------------------------------------------------

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.alloc(Some(parent), NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            annotation: None,
        });
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.push(id);
        }
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.alloc(Some(parent), NodeData::Text(text.to_string()));
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.push(id);
        }
        id
    }

    /// Overwrite a text node's content, bumping its revision
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), TreeError> {
        let revision = self.bump_revision();
        let slot = self.slot_mut(node).ok_or(TreeError::Detached(node))?;
        match &mut slot.data {
            NodeData::Text(content) => {
                *content = text.to_string();
                slot.revision = revision;
                Ok(())
            }
            NodeData::Element { .. } => Err(TreeError::NotText(node)),
        }
    }

    /// Remove a node (and its subtree) from its parent
    pub fn detach(&mut self, node: NodeId) {
        let parent = match self.slot(node).and_then(|s| s.parent) {
            Some(p) => p,
            None => return,
        };
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.retain(|&c| c != node);
        }
        if let Some(slot) = self.slot_mut(node) {
            slot.parent = None;
        }
    }

    /// Make every edit touching `node` fail with a host error
    pub fn freeze(&mut self, node: NodeId) {
        self.frozen.insert(node);
    }

    pub fn thaw(&mut self, node: NodeId) {
        self.frozen.remove(&node);
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Attached wrappers in document order
    pub fn annotation_nodes(&self) -> Vec<(NodeId, WrapperSpec)> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            let Some(slot) = self.slot(node) else { continue };
            if let NodeData::Element {
                annotation: Some(spec),
                ..
            } = &slot.data
            {
                out.push((node, spec.clone()));
            }
            stack.extend(slot.children.iter().rev().copied());
        }
        out
    }

    pub fn wrapper_spec(&self, node: NodeId) -> Option<&WrapperSpec> {
        match &self.slot(node)?.data {
            NodeData::Element { annotation, .. } => annotation.as_ref(),
            NodeData::Text(_) => None,
        }
    }

    /// Text a reader would see: content under hide wrappers is skipped
    pub fn visible_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let Some(slot) = self.slot(n) else { continue };
            match &slot.data {
                NodeData::Text(text) => out.push_str(text),
                NodeData::Element { annotation, .. } => {
                    if matches!(annotation, Some(spec) if spec.mode == Mode::Hide) {
                        continue;
                    }
                    stack.extend(slot.children.iter().rev().copied());
                }
            }
        }
        out
    }

    /// Count of attached nodes, root included
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self.root];
        while let Some(n) = stack.pop() {
            count += 1;
            if let Some(slot) = self.slot(n) {
                stack.extend(slot.children.iter().copied());
            }
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.slot(self.root).map_or(true, |s| s.children.is_empty())
    }

    fn check_editable(&self, node: NodeId) -> Result<NodeId, TreeError> {
        if self.frozen.contains(&node) {
            return Err(TreeError::Host(format!("node {} is locked", node)));
        }
        if !self.contains(node) || node == self.root {
            return Err(TreeError::Detached(node));
        }
        self.slot(node)
            .and_then(|s| s.parent)
            .ok_or(TreeError::Detached(node))
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> Result<usize, TreeError> {
        self.slot(parent)
            .and_then(|s| s.children.iter().position(|&c| c == child))
            .ok_or(TreeError::Detached(child))
    }

    fn text_of(&self, node: Option<NodeId>) -> Option<(NodeId, String)> {
        let node = node?;
        match &self.slot(node)?.data {
            NodeData::Text(text) => Some((node, text.clone())),
            NodeData::Element { .. } => None,
        }
    }
}

impl TreeSource for MemoryTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn contains(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.slot(current).and_then(|s| s.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.slot(node).map(|s| s.children.clone()).unwrap_or_default()
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        Some(match &self.slot(node)?.data {
            NodeData::Element { tag, .. } => NodeKind::Element(tag.clone()),
            NodeData::Text(text) => NodeKind::Text(text.clone()),
        })
    }

    fn annotation_id(&self, node: NodeId) -> Option<String> {
        self.wrapper_spec(node).map(|spec| spec.id.clone())
    }

    fn revision(&self, node: NodeId) -> u64 {
        self.slot(node).map_or(0, |s| s.revision)
    }

    fn replace_text(&mut self, node: NodeId, segments: &[Segment]) -> Result<Vec<NodeId>, TreeError> {
        let parent = self.check_editable(node)?;
        if !self.is_text(node) {
            return Err(TreeError::NotText(node));
        }
        let index = self.child_index(parent, node)?;

        let mut created = Vec::with_capacity(segments.len());
        for segment in segments {
            let id = match segment {
                Segment::Text { text } => self.alloc(Some(parent), NodeData::Text(text.clone())),
                Segment::Wrapper(spec) => {
                    let wrapper = self.alloc(Some(parent), NodeData::Element {
                        tag: WRAPPER_TAG.to_string(),
                        annotation: Some(spec.clone()),
                    });
                    let inner = self.alloc(Some(wrapper), NodeData::Text(spec.text.clone()));
                    if let Some(slot) = self.slot_mut(wrapper) {
                        slot.children.push(inner);
                    }
                    wrapper
                }
            };
            created.push(id);
        }

        if let Some(slot) = self.slot_mut(parent) {
            slot.children.splice(index..=index, created.iter().copied());
        }
        if let Some(slot) = self.slot_mut(node) {
            slot.parent = None;
        }
        Ok(created)
    }

    fn find_annotation(&self, id: &str) -> Option<NodeId> {
        self.annotation_nodes()
            .into_iter()
            .find(|(_, spec)| spec.id == id)
            .map(|(node, _)| node)
    }

    fn unwrap_annotation(&mut self, wrapper: NodeId, text: &str) -> Result<NodeId, TreeError> {
        let parent = self.check_editable(wrapper)?;
        if self.wrapper_spec(wrapper).is_none() {
            return Err(TreeError::NotAnnotation(wrapper));
        }
        let index = self.child_index(parent, wrapper)?;
        let siblings = self.children(parent);

        // Merge with adjacent text so restored content reads as one unit again
        let before = self.text_of(index.checked_sub(1).map(|i| siblings[i]));
        let after = self.text_of(siblings.get(index + 1).copied());

        let mut merged = String::new();
        let mut start = index;
        let mut end = index;
        if let Some((_, prev)) = &before {
            merged.push_str(prev);
            start -= 1;
        }
        merged.push_str(text);
        if let Some((_, next)) = &after {
            merged.push_str(next);
            end += 1;
        }

        let restored = self.alloc(Some(parent), NodeData::Text(merged));
        let removed: Vec<NodeId> = siblings[start..=end].to_vec();
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.splice(start..=end, std::iter::once(restored));
        }
        for node in removed {
            if let Some(slot) = self.slot_mut(node) {
                slot.parent = None;
            }
        }
        Ok(restored)
    }
}

// =============================================================================
// Tests
// =============================================================================
