//! Incremental Scheduler: pass state machine and mutation debouncing
//!
//! # State machine
//! `Idle → Scanning → Idle`. A pass is started by a configuration apply (full
//! document) or by a debounced batch of mutations (affected subtrees only).
//! While scanning, new mutation roots accumulate in the debouncer and run as
//! the next pass; explicit applies are rejected as busy.
//!
//! Every apply and every clear bumps the generation. A pass carries the
//! generation it was started under and aborts silently at its next chunk
//! once superseded.

use serde::{Deserialize, Serialize};

use crate::annotator::AnnotationStyle;
use crate::pattern::Pattern;
use crate::scanner::TreeWalker;
use crate::tree::{NodeId, NodeKind, TreeSource};

// =============================================================================
// Mutation records
// =============================================================================

/// One batch of document changes reported by the host.
///
/// Only element entries of `added_nodes` start a rescan. A host that inserts
/// a bare text node reports its parent in `changed_text_parents` instead,
/// as it does for edited character data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    #[serde(default)]
    pub added_nodes: Vec<NodeId>,
    /// Parents of character data that changed
    #[serde(default)]
    pub changed_text_parents: Vec<NodeId>,
}

/// Subtree roots touched by `records`: added elements and parents of
/// changed text. Annotation wrappers and their contents are ignored so our
/// own edits never feed back into a rescan.
pub fn affected_roots<T: TreeSource + ?Sized>(tree: &T, records: &[ChangeRecord]) -> Vec<NodeId> {
    let added = records
        .iter()
        .flat_map(|r| r.added_nodes.iter().copied())
        .filter(|&node| matches!(tree.kind(node), Some(NodeKind::Element(_))));
    let changed = records
        .iter()
        .flat_map(|r| r.changed_text_parents.iter().copied());

    let mut roots = Vec::new();
    for node in added.chain(changed) {
        if roots.contains(&node) || !tree.contains(node) || tree.within_annotation(node) {
            continue;
        }
        roots.push(node);
    }
    roots
}

/// Drop detached roots, roots inside annotations, and roots covered by
/// another root in the set
pub fn normalize_roots<T: TreeSource + ?Sized>(tree: &T, roots: &[NodeId]) -> Vec<NodeId> {
    let live: Vec<NodeId> = roots
        .iter()
        .copied()
        .filter(|&n| tree.contains(n) && !tree.within_annotation(n))
        .collect();

    let mut out: Vec<NodeId> = Vec::with_capacity(live.len());
    for (i, &node) in live.iter().enumerate() {
        if out.contains(&node) {
            continue;
        }
        let covered = live
            .iter()
            .enumerate()
            .any(|(j, &other)| j != i && other != node && tree.is_ancestor_or_self(other, node));
        if !covered {
            out.push(node);
        }
    }
    out
}

// =============================================================================
// Debouncer
// =============================================================================

/// Trailing-edge debounce: every notification pushes the deadline out by
/// one window; roots accumulate until the window elapses quietly.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u64,
    roots: Vec<NodeId>,
    deadline: Option<u64>,
    notifications: usize,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            roots: Vec::new(),
            deadline: None,
            notifications: 0,
        }
    }

    pub fn push(&mut self, roots: Vec<NodeId>, now_ms: u64) {
        for root in roots {
            if !self.roots.contains(&root) {
                self.roots.push(root);
            }
        }
        self.notifications += 1;
        self.deadline = Some(now_ms + self.window_ms);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn is_ready(&self, now_ms: u64) -> bool {
        self.deadline.is_some_and(|d| now_ms >= d)
    }

    /// Notifications coalesced into the pending batch
    pub fn notifications(&self) -> usize {
        self.notifications
    }

    pub fn take(&mut self) -> Vec<NodeId> {
        self.deadline = None;
        self.notifications = 0;
        std::mem::take(&mut self.roots)
    }

    pub fn clear(&mut self) {
        self.take();
    }
}

// =============================================================================
// Passes and reports
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    /// Whole document after a configuration apply
    Full,
    /// Affected subtrees after mutations
    Incremental,
}

/// Completion signal for one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub match_count: usize,
    pub process_time_millis: u64,
    pub units_scanned: usize,
    pub pass: PassKind,
    pub generation: u64,
}

impl ScanReport {
    /// Report for a pass that committed nothing
    pub fn empty(pass: PassKind, generation: u64) -> Self {
        Self {
            match_count: 0,
            process_time_millis: 0,
            units_scanned: 0,
            pass,
            generation,
        }
    }
}

/// Result of one `step()` call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum StepOutcome {
    /// Nothing scheduled
    Idle,
    /// A debounced rescan is pending until the given time
    Waiting {
        #[serde(rename = "untilMs")]
        until_ms: u64,
    },
    /// One chunk processed; more remain
    Yielded { units: usize, matches: usize },
    Completed(ScanReport),
    /// The in-flight pass was invalidated and dropped
    Superseded,
}

/// An in-flight pass. Pattern and style are snapshots taken at start.
#[derive(Debug, Clone)]
pub struct ScanPass {
    pub generation: u64,
    pub kind: PassKind,
    pub walker: TreeWalker,
    pub pattern: Pattern,
    pub style: AnnotationStyle,
    pub started_ms: u64,
    pub units: usize,
    pub matches: usize,
}

impl ScanPass {
    pub fn new(
        generation: u64,
        kind: PassKind,
        roots: &[NodeId],
        pattern: Pattern,
        style: AnnotationStyle,
        started_ms: u64,
    ) -> Self {
        Self {
            generation,
            kind,
            walker: TreeWalker::new(roots),
            pattern,
            style,
            started_ms,
            units: 0,
            matches: 0,
        }
    }

    pub fn report(&self, now_ms: u64) -> ScanReport {
        ScanReport {
            match_count: self.matches,
            process_time_millis: now_ms.saturating_sub(self.started_ms),
            units_scanned: self.units,
            pass: self.kind,
            generation: self.generation,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SchedulerState {
    Idle,
    Scanning(ScanPass),
}

/// Pass bookkeeping shared by all entry points of the engine
#[derive(Debug, Clone)]
pub struct Scheduler {
    pub state: SchedulerState,
    pub debounce: Debouncer,
    pub chunk_size: usize,
    generation: u64,
}

impl Scheduler {
    pub fn new(chunk_size: usize, debounce_ms: u64) -> Self {
        Self {
            state: SchedulerState::Idle,
            debounce: Debouncer::new(debounce_ms),
            chunk_size: chunk_size.max(1),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidate whatever pass is running
    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.state, SchedulerState::Scanning(_))
    }

    pub fn begin(&mut self, pass: ScanPass) {
        self.state = SchedulerState::Scanning(pass);
    }

    pub fn finish(&mut self) {
        self.state = SchedulerState::Idle;
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            SchedulerState::Idle => "idle",
            SchedulerState::Scanning(_) => "scanning",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::tree::{MemoryTree, Segment, WrapperSpec};

    #[test]
    fn test_debouncer_trailing_edge() {
        let mut debounce = Debouncer::new(150);
        debounce.push(vec![NodeId(1)], 0);
        debounce.push(vec![NodeId(2)], 100);

        assert!(!debounce.is_ready(150), "second push moved the deadline");
        assert!(debounce.is_ready(250));
        assert_eq!(debounce.notifications(), 2);
        assert_eq!(debounce.take(), vec![NodeId(1), NodeId(2)]);
        assert!(!debounce.is_pending());
    }

    #[test]
    fn test_debouncer_dedupes_roots() {
        let mut debounce = Debouncer::new(10);
        debounce.push(vec![NodeId(3), NodeId(3)], 0);
        debounce.push(vec![NodeId(3)], 1);
        assert_eq!(debounce.take(), vec![NodeId(3)]);
    }

    #[test]
    fn test_affected_roots_filters_text_and_wrappers() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let div = tree.append_element(root, "div");
        let text = tree.append_text(root, "added text");
        let p = tree.append_element(root, "p");
        let t = tree.append_text(p, "a cat");
        let created = tree
            .replace_text(
                t,
                &[
                    Segment::Text {
                        text: "a ".to_string(),
                    },
                    Segment::Wrapper(WrapperSpec {
                        id: "w".to_string(),
                        text: "cat".to_string(),
                        mode: Mode::Highlight,
                        color: None,
                        removable: true,
                    }),
                ],
            )
            .unwrap();

        let records = vec![
            ChangeRecord {
                added_nodes: vec![div, text, created[1]],
                changed_text_parents: vec![],
            },
            ChangeRecord {
                added_nodes: vec![],
                changed_text_parents: vec![p, div],
            },
        ];

        assert_eq!(affected_roots(&tree, &records), vec![div, p]);
    }

    #[test]
    fn test_normalize_roots_drops_nested_and_detached() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let outer = tree.append_element(root, "section");
        let inner = tree.append_element(outer, "p");
        let other = tree.append_element(root, "aside");
        let gone = tree.append_element(root, "div");
        tree.detach(gone);

        let roots = normalize_roots(&tree, &[inner, outer, gone, other, outer]);
        assert_eq!(roots, vec![outer, other]);
    }

    #[test]
    fn test_change_record_wire_format() {
        let json = r#"{"addedNodes": [4, 5], "changedTextParents": [9]}"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.added_nodes, vec![NodeId(4), NodeId(5)]);
        assert_eq!(record.changed_text_parents, vec![NodeId(9)]);
    }

    #[test]
    fn test_step_outcome_wire_format() {
        let value = serde_json::to_value(StepOutcome::Waiting { until_ms: 250 }).unwrap();
        assert_eq!(value["state"], "waiting");
        assert_eq!(value["untilMs"], 250);

        let done = StepOutcome::Completed(ScanReport::empty(PassKind::Incremental, 3));
        let value = serde_json::to_value(done).unwrap();
        assert_eq!(value["state"], "completed");
        assert_eq!(value["pass"], "incremental");
        assert_eq!(value["matchCount"], 0);
    }

    #[test]
    fn test_generation_bumps() {
        let mut scheduler = Scheduler::new(0, 150);
        assert_eq!(scheduler.chunk_size, 1);
        assert_eq!(scheduler.bump_generation(), 1);
        assert_eq!(scheduler.generation(), 1);
        assert_eq!(scheduler.state_name(), "idle");
    }
}
