//! Engine tests driven by `MemoryTree` and `ManualClock`


use crate::clock::ManualClock;
use crate::config::EngineOptions;
use crate::engine::AnnotationEngine;
use crate::tree::{MemoryTree, NodeId, TreeSource};

type TestEngine = AnnotationEngine<MemoryTree, ManualClock>;

fn engine_with(tree: MemoryTree, chunk_size: usize) -> (TestEngine, ManualClock) {
    let clock = ManualClock::new();
    let options = EngineOptions {
        chunk_size,
        debounce_ms: 150,
        id_prefix: "test".to_string(),
    };
    (AnnotationEngine::new(tree, clock.clone(), options), clock)
}

/// Tree with one `<p>` per text; returns the paragraph handles
fn paragraphs(texts: &[&str]) -> (MemoryTree, Vec<NodeId>) {
    let mut tree = MemoryTree::new();
    let root = tree.root();
    let nodes = texts
        .iter()
        .map(|text| {
            let p = tree.append_element(root, "p");
            tree.append_text(p, text);
            p
        })
        .collect();
    (tree, nodes)
}

/// Wrappers whose parent chain contains another wrapper
fn nested_wrappers(tree: &MemoryTree) -> usize {
    tree.annotation_nodes()
        .into_iter()
        .filter(|(node, _)| {
            tree.parent(*node)
                .is_some_and(|parent| tree.within_annotation(parent))
        })
        .count()
}
