//! Tree Scanner: lazy pre-order walk yielding eligible text units
//!
//! The walker keeps only a stack of pending handles, so it can be paused
//! between chunks while the annotator edits the tree. Exclusions:
//! - whitespace-only text
//! - text whose parent is script/style/textarea/input
//! - text inside an annotation wrapper (wrapper subtrees are never entered)
//! - units already present in the tracker

use crate::tracker::{UnitKey, UnitTracker};
use crate::tree::{NodeId, NodeKind, TreeSource};

/// Elements whose text content is never annotated
pub const EXCLUDED_TAGS: [&str; 4] = ["script", "style", "textarea", "input"];

pub fn is_excluded_tag(tag: &str) -> bool {
    EXCLUDED_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

/// One run of character data, valid for the current pass only
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub node: NodeId,
    pub parent: NodeId,
    pub text: String,
    pub key: UnitKey,
}

/// Resumable pre-order cursor over one or more subtree roots
#[derive(Debug, Clone, Default)]
pub struct TreeWalker {
    stack: Vec<NodeId>,
}

impl TreeWalker {
    /// Walk `roots` in the given order
    pub fn new(roots: &[NodeId]) -> Self {
        Self {
            stack: roots.iter().rev().copied().collect(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.stack.is_empty()
    }

    /// Advance to the next eligible unit
    pub fn next_unit<T: TreeSource + ?Sized>(
        &mut self,
        tree: &T,
        tracker: &UnitTracker,
    ) -> Option<TextUnit> {
        while let Some(node) = self.stack.pop() {
            match tree.kind(node) {
                Some(NodeKind::Element(tag)) => {
                    if is_excluded_tag(&tag) || tree.annotation_id(node).is_some() {
                        continue;
                    }
                    self.stack.extend(tree.children(node).into_iter().rev());
                }
                Some(NodeKind::Text(text)) => {
                    if let Some(unit) = accept(tree, tracker, node, text) {
                        return Some(unit);
                    }
                }
                None => {}
            }
        }
        None
    }

    /// Pull up to `limit` units
    pub fn next_chunk<T: TreeSource + ?Sized>(
        &mut self,
        tree: &T,
        tracker: &UnitTracker,
        limit: usize,
    ) -> Vec<TextUnit> {
        let mut chunk = Vec::with_capacity(limit);
        while chunk.len() < limit {
            match self.next_unit(tree, tracker) {
                Some(unit) => chunk.push(unit),
                None => break,
            }
        }
        chunk
    }
}

fn accept<T: TreeSource + ?Sized>(
    tree: &T,
    tracker: &UnitTracker,
    node: NodeId,
    text: String,
) -> Option<TextUnit> {
    if text.trim().is_empty() {
        return None;
    }
    let parent = tree.parent(node)?;
    if tree.tag_name(parent).is_some_and(|tag| is_excluded_tag(&tag)) {
        return None;
    }
    if tree.within_annotation(parent) || !tree.contains(node) {
        return None;
    }
    let key = UnitKey::of(tree, node);
    if tracker.contains(&key) {
        return None;
    }
    Some(TextUnit {
        node,
        parent,
        text,
        key,
    })
}

/// Borrowing iterator over the eligible units of one subtree
pub struct Units<'a, T: TreeSource + ?Sized> {
    tree: &'a T,
    tracker: &'a UnitTracker,
    walker: TreeWalker,
}

impl<T: TreeSource + ?Sized> Iterator for Units<'_, T> {
    type Item = TextUnit;

    fn next(&mut self) -> Option<TextUnit> {
        self.walker.next_unit(self.tree, self.tracker)
    }
}

/// Lazy, restartable sequence of eligible text units under `root`
pub fn scan<'a, T: TreeSource + ?Sized>(
    tree: &'a T,
    root: NodeId,
    tracker: &'a UnitTracker,
) -> Units<'a, T> {
    Units {
        tree,
        tracker,
        walker: TreeWalker::new(&[root]),
    }
}

// =============================================================================
// Tests
// =============================================================================
