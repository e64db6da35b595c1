//! Annotator: turns matches in a text unit into wrapper elements
//!
//! The unit's text is split into plain and wrapped segments, then handed to
//! the host as one atomic replacement. A failed replacement leaves the unit
//! untouched and counts as zero matches.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{Configuration, Mode};
use crate::diagnostics;
use crate::error::TreeError;
use crate::pattern::Pattern;
use crate::registry::{Annotation, AnnotationRegistry};
use crate::scanner::TextUnit;
use crate::tracker::{UnitKey, UnitTracker};
use crate::tree::{Segment, TreeSource, WrapperSpec};

/// Styling snapshot taken when a pass starts
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationStyle {
    pub mode: Mode,
    pub color: String,
}

impl AnnotationStyle {
    /// Color carried by wrappers; hide wrappers carry none
    pub fn wrapper_color(&self) -> Option<&str> {
        match self.mode {
            Mode::Highlight => Some(self.color.as_str()),
            Mode::Hide => None,
        }
    }
}

impl From<&Configuration> for AnnotationStyle {
    fn from(config: &Configuration) -> Self {
        Self {
            mode: config.mode,
            color: config.color.clone(),
        }
    }
}

/// Generators created by this module instance
static GENERATORS: AtomicU64 = AtomicU64::new(0);

/// Unique annotation ids: `<prefix>-<session>-<n>`.
///
/// The session combines creation time, a per-process generator count and
/// random bits, so engines sharing one document never hand out the same id.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    session: String,
    next: u64,
}

impl IdGenerator {
    pub fn new(prefix: &str) -> Self {
        let instance = GENERATORS.fetch_add(1, Ordering::Relaxed);
        Self {
            prefix: prefix.to_string(),
            session: format!(
                "{:x}{:x}{:08x}",
                chrono::Utc::now().timestamp_millis(),
                instance,
                random_salt()
            ),
            next: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        self.next += 1;
        format!("{}-{}-{}", self.prefix, self.session, self.next)
    }
}

/// Random bits separating generators in different module instances
fn random_salt() -> u32 {
    let mut bytes = [0u8; 4];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u32::from_le_bytes(bytes),
        Err(e) => {
            diagnostics::warn("IdGenerator", format!("no entropy source: {}", e));
            0
        }
    }
}

/// A match found but not yet committed to the tree
#[derive(Debug, Clone)]
struct PendingAnnotation {
    id: String,
    text: String,
}

#[derive(Debug, Clone)]
pub struct Annotator {
    ids: IdGenerator,
}

impl Annotator {
    pub fn new(id_prefix: &str) -> Self {
        Self {
            ids: IdGenerator::new(id_prefix),
        }
    }

    /// Wrap every match in `unit`. Returns the number of annotations committed.
    pub fn apply<T: TreeSource + ?Sized>(
        &mut self,
        tree: &mut T,
        unit: &TextUnit,
        pattern: &Pattern,
        style: &AnnotationStyle,
        registry: &mut AnnotationRegistry,
        tracker: &mut UnitTracker,
    ) -> usize {
        tracker.mark(unit.key);

        match self.commit(tree, unit, pattern, style, registry, tracker) {
            Ok(count) => count,
            Err(e) => {
                diagnostics::warn("Annotator", format!("skipping unit {}: {}", unit.node, e));
                0
            }
        }
    }

    fn commit<T: TreeSource + ?Sized>(
        &mut self,
        tree: &mut T,
        unit: &TextUnit,
        pattern: &Pattern,
        style: &AnnotationStyle,
        registry: &mut AnnotationRegistry,
        tracker: &mut UnitTracker,
    ) -> Result<usize, TreeError> {
        let spans = pattern.find_spans(&unit.text);
        if spans.is_empty() {
            return Ok(0);
        }

        // The unit may have changed since it was pulled
        if tree.text(unit.node).as_deref() != Some(unit.text.as_str()) {
            return Err(TreeError::Detached(unit.node));
        }

        let (segments, pending) = self.build_segments(&unit.text, &spans, style);
        let created = tree.replace_text(unit.node, &segments)?;

        for (node, segment) in created.iter().zip(&segments) {
            if let Segment::Text { .. } = segment {
                tracker.mark(UnitKey::of(tree, *node));
            }
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let count = pending.len();
        for p in pending {
            registry.insert(Annotation {
                id: p.id,
                original_text: p.text,
                color: style.color.clone(),
                mode: style.mode,
                created_at,
            });
        }
        Ok(count)
    }

    fn build_segments(
        &mut self,
        text: &str,
        spans: &[std::ops::Range<usize>],
        style: &AnnotationStyle,
    ) -> (Vec<Segment>, Vec<PendingAnnotation>) {
        let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
        let mut pending = Vec::with_capacity(spans.len());
        let mut cursor = 0;

        for span in spans {
            if span.start > cursor {
                segments.push(Segment::Text {
                    text: text[cursor..span.start].to_string(),
                });
            }
            let hit = text[span.clone()].to_string();
            let id = self.ids.next_id();
            segments.push(Segment::Wrapper(WrapperSpec {
                id: id.clone(),
                text: hit.clone(),
                mode: style.mode,
                color: style.wrapper_color().map(str::to_string),
                removable: style.mode == Mode::Highlight,
            }));
            pending.push(PendingAnnotation { id, text: hit });
            cursor = span.end;
        }
        if cursor < text.len() {
            segments.push(Segment::Text {
                text: text[cursor..].to_string(),
            });
        }
        (segments, pending)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::compile;
    use crate::scanner::scan;
    use crate::tree::{MemoryTree, NodeId};

    struct Fixture {
        tree: MemoryTree,
        registry: AnnotationRegistry,
        tracker: UnitTracker,
        annotator: Annotator,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tree: MemoryTree::new(),
                registry: AnnotationRegistry::new(),
                tracker: UnitTracker::new(),
                annotator: Annotator::new("test"),
            }
        }

        fn first_unit(&self, root: NodeId) -> TextUnit {
            scan(&self.tree, root, &self.tracker).next().unwrap()
        }

        fn apply(&mut self, unit: &TextUnit, pattern: &Pattern, style: &AnnotationStyle) -> usize {
            self.annotator.apply(
                &mut self.tree,
                unit,
                pattern,
                style,
                &mut self.registry,
                &mut self.tracker,
            )
        }
    }

    fn highlight() -> AnnotationStyle {
        AnnotationStyle {
            mode: Mode::Highlight,
            color: "#ffeb3b".to_string(),
        }
    }

    #[test]
    fn test_no_match_is_noop() {
        let mut fx = Fixture::new();
        let p = fx.tree.append_element(fx.tree.root(), "p");
        let t = fx.tree.append_text(p, "nothing here");
        let unit = fx.first_unit(p);
        let pattern = compile(&["cat"], false).unwrap();

        assert_eq!(fx.apply(&unit, &pattern, &highlight()), 0);
        assert!(fx.tree.contains(t), "unit untouched");
        assert!(fx.tracker.contains(&unit.key), "unit still marked as visited");
    }

    #[test]
    fn test_wraps_only_matched_span() {
        let mut fx = Fixture::new();
        let p = fx.tree.append_element(fx.tree.root(), "p");
        fx.tree.append_text(p, "The cat sat");
        let unit = fx.first_unit(p);
        let pattern = compile(&["cat", "dog"], false).unwrap();

        assert_eq!(fx.apply(&unit, &pattern, &highlight()), 1);

        let children = fx.tree.children(p);
        assert_eq!(children.len(), 3);
        assert_eq!(fx.tree.text(children[0]).as_deref(), Some("The "));
        assert_eq!(fx.tree.text(children[2]).as_deref(), Some(" sat"));

        let spec = fx.tree.wrapper_spec(children[1]).unwrap();
        assert_eq!(spec.text, "cat");
        assert_eq!(spec.color.as_deref(), Some("#ffeb3b"));
        assert!(spec.removable);

        let annotation = fx.registry.get(&spec.id).unwrap();
        assert_eq!(annotation.original_text, "cat");
        assert_eq!(annotation.mode, Mode::Highlight);
        assert_eq!(fx.tree.text_content(p), "The cat sat");
    }

    #[test]
    fn test_multiple_matches_left_to_right() {
        let mut fx = Fixture::new();
        let p = fx.tree.append_element(fx.tree.root(), "p");
        fx.tree.append_text(p, "dog and cat and dog");
        let unit = fx.first_unit(p);
        let pattern = compile(&["cat", "dog"], false).unwrap();

        assert_eq!(fx.apply(&unit, &pattern, &highlight()), 3);

        let wrapped: Vec<String> = fx
            .tree
            .annotation_nodes()
            .into_iter()
            .map(|(_, spec)| spec.text)
            .collect();
        assert_eq!(wrapped, vec!["dog", "cat", "dog"]);

        let ids: std::collections::HashSet<String> = fx
            .tree
            .annotation_nodes()
            .into_iter()
            .map(|(_, spec)| spec.id)
            .collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(fx.registry.len(), 3);
    }

    #[test]
    fn test_hide_mode_wrapper() {
        let mut fx = Fixture::new();
        let p = fx.tree.append_element(fx.tree.root(), "p");
        fx.tree.append_text(p, "cat dog");
        let unit = fx.first_unit(p);
        let pattern = compile(&["cat"], false).unwrap();
        let style = AnnotationStyle {
            mode: Mode::Hide,
            color: "#ffeb3b".to_string(),
        };

        assert_eq!(fx.apply(&unit, &pattern, &style), 1);
        let (_, spec) = fx.tree.annotation_nodes().remove(0);
        assert_eq!(spec.mode, Mode::Hide);
        assert!(spec.color.is_none());
        assert!(!spec.removable);
        assert_eq!(fx.tree.visible_text(p), " dog");
    }

    #[test]
    fn test_failed_wrap_counts_zero_and_leaves_unit() {
        let mut fx = Fixture::new();
        let p = fx.tree.append_element(fx.tree.root(), "p");
        let t = fx.tree.append_text(p, "the cat");
        let unit = fx.first_unit(p);
        fx.tree.freeze(t);
        let pattern = compile(&["cat"], false).unwrap();

        assert_eq!(fx.apply(&unit, &pattern, &highlight()), 0);
        assert!(fx.registry.is_empty());
        assert_eq!(fx.tree.children(p), vec![t]);
    }

    #[test]
    fn test_stale_unit_is_skipped() {
        let mut fx = Fixture::new();
        let p = fx.tree.append_element(fx.tree.root(), "p");
        let t = fx.tree.append_text(p, "the cat");
        let unit = fx.first_unit(p);
        fx.tree.set_text(t, "the bird").unwrap();
        let pattern = compile(&["cat"], false).unwrap();

        assert_eq!(fx.apply(&unit, &pattern, &highlight()), 0);
        assert!(fx.tree.annotation_nodes().is_empty());
    }

    #[test]
    fn test_plain_remainders_are_tracked() {
        let mut fx = Fixture::new();
        let p = fx.tree.append_element(fx.tree.root(), "p");
        fx.tree.append_text(p, "a cat b");
        let unit = fx.first_unit(p);
        let pattern = compile(&["cat"], false).unwrap();
        fx.apply(&unit, &pattern, &highlight());

        assert!(scan(&fx.tree, p, &fx.tracker).next().is_none());
    }

    #[test]
    fn test_id_generator_is_unique() {
        let mut ids = IdGenerator::new("kw");
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(a.starts_with("kw-"));
    }

    #[test]
    fn test_generators_created_together_never_collide() {
        let mut first = IdGenerator::new("kittmark");
        let mut second = IdGenerator::new("kittmark");

        let from_first: std::collections::HashSet<String> =
            (0..100).map(|_| first.next_id()).collect();
        assert!((0..100).all(|_| !from_first.contains(&second.next_id())));
    }

    #[test]
    fn test_wrapper_color_only_in_highlight_mode() {
        assert_eq!(highlight().wrapper_color(), Some("#ffeb3b"));
        let hide = AnnotationStyle::from(&Configuration::hide(&["a"]));
        assert_eq!(hide.wrapper_color(), None);
    }
}
