//! Annotation Registry: the authoritative set of active annotations
//!
//! Every registered id has exactly one wrapper in the tree and every wrapper
//! in the tree has its id registered. Removal puts the original text back.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::Mode;
use crate::diagnostics;
use crate::tree::TreeSource;

/// A committed annotation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub original_text: String,
    pub color: String,
    pub mode: Mode,
    /// Unix epoch milliseconds
    pub created_at: i64,
}

#[derive(Debug, Default, Clone)]
pub struct AnnotationRegistry {
    entries: HashMap<String, Annotation>,
}

impl AnnotationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, annotation: Annotation) {
        self.entries.insert(annotation.id.clone(), annotation);
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.entries.values()
    }

    /// Replace the wrapper for `id` with its original text.
    /// Returns false when the wrapper is already gone.
    pub fn remove<T: TreeSource + ?Sized>(&mut self, tree: &mut T, id: &str) -> bool {
        let Some(wrapper) = tree.find_annotation(id) else {
            // Keep the registry in step with the tree
            self.entries.remove(id);
            return false;
        };

        let text = match self.entries.get(id) {
            Some(annotation) => annotation.original_text.clone(),
            None => tree.text_content(wrapper),
        };

        match tree.unwrap_annotation(wrapper, &text) {
            Ok(_) => {
                self.entries.remove(id);
                true
            }
            Err(e) => {
                diagnostics::warn("AnnotationRegistry", format!("remove {} failed: {}", id, e));
                false
            }
        }
    }

    /// Remove every registered annotation. Returns how many wrappers were
    /// restored. Entries whose wrapper could not be unwrapped stay registered
    /// so a later clear can retry them.
    pub fn clear<T: TreeSource + ?Sized>(&mut self, tree: &mut T) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let ids: Vec<String> = self.entries.keys().cloned().collect();
        let mut removed = 0;
        for id in &ids {
            if self.remove(tree, id) {
                removed += 1;
            }
        }
        if !self.entries.is_empty() {
            diagnostics::warn(
                "AnnotationRegistry",
                format!("{} annotation(s) could not be removed", self.entries.len()),
            );
        }
        removed
    }
}

// =============================================================================
// Tests
// =============================================================================
