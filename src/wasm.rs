//! WASM surface: a JS-side document host and the `KeywordEngine` wrapper
//!
//! The host object passed to `new KeywordEngine(host)` must implement:
//! ```javascript,ignore
//! {
//!   root(): number,
//!   contains(node): boolean,
//!   parent(node): number | undefined,
//!   children(node): number[],
//!   tagName(node): string | undefined,     // elements only
//!   textOf(node): string | undefined,      // text nodes only
//!   annotationId(node): string | undefined,
//!   revision(node): number,
//!   replaceText(node, segments): number[], // may throw
//!   findAnnotation(id): number | undefined,
//!   unwrapAnnotation(node, text): number,  // may throw
//! }
//! ```

use wasm_bindgen::prelude::*;

use crate::clock::InstantClock;
use crate::config::{Configuration, EngineOptions};
use crate::diagnostics;
use crate::engine::AnnotationEngine;
use crate::error::TreeError;
use crate::message::Command;
use crate::scheduler::ChangeRecord;
use crate::tree::{NodeId, NodeKind, Segment, TreeSource};

#[wasm_bindgen]
extern "C" {
    /// Document host implemented in JS over real DOM nodes
    pub type JsTreeHost;

    #[wasm_bindgen(method, js_name = root)]
    fn host_root(this: &JsTreeHost) -> u32;

    #[wasm_bindgen(method, js_name = contains)]
    fn host_contains(this: &JsTreeHost, node: u32) -> bool;

    #[wasm_bindgen(method, js_name = parent)]
    fn host_parent(this: &JsTreeHost, node: u32) -> Option<u32>;

    #[wasm_bindgen(method, js_name = children)]
    fn host_children(this: &JsTreeHost, node: u32) -> JsValue;

    #[wasm_bindgen(method, js_name = tagName)]
    fn host_tag_name(this: &JsTreeHost, node: u32) -> Option<String>;

    #[wasm_bindgen(method, js_name = textOf)]
    fn host_text_of(this: &JsTreeHost, node: u32) -> Option<String>;

    #[wasm_bindgen(method, js_name = annotationId)]
    fn host_annotation_id(this: &JsTreeHost, node: u32) -> Option<String>;

    #[wasm_bindgen(method, js_name = revision)]
    fn host_revision(this: &JsTreeHost, node: u32) -> f64;

    #[wasm_bindgen(method, catch, js_name = replaceText)]
    fn host_replace_text(this: &JsTreeHost, node: u32, segments: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, js_name = findAnnotation)]
    fn host_find_annotation(this: &JsTreeHost, id: &str) -> Option<u32>;

    #[wasm_bindgen(method, catch, js_name = unwrapAnnotation)]
    fn host_unwrap_annotation(this: &JsTreeHost, wrapper: u32, text: &str) -> Result<u32, JsValue>;
}

fn host_error(value: JsValue) -> TreeError {
    TreeError::Host(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

fn decode_nodes(value: JsValue) -> Result<Vec<NodeId>, TreeError> {
    serde_wasm_bindgen::from_value(value).map_err(|e| TreeError::Host(e.to_string()))
}

impl TreeSource for JsTreeHost {
    fn root(&self) -> NodeId {
        NodeId(self.host_root())
    }

    fn contains(&self, node: NodeId) -> bool {
        self.host_contains(node.0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.host_parent(node.0).map(NodeId)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        match decode_nodes(self.host_children(node.0)) {
            Ok(children) => children,
            Err(e) => {
                diagnostics::warn("JsTreeHost", &e);
                Vec::new()
            }
        }
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        if let Some(tag) = self.host_tag_name(node.0) {
            return Some(NodeKind::Element(tag.to_ascii_lowercase()));
        }
        self.host_text_of(node.0).map(NodeKind::Text)
    }

    fn annotation_id(&self, node: NodeId) -> Option<String> {
        self.host_annotation_id(node.0)
    }

    fn revision(&self, node: NodeId) -> u64 {
        self.host_revision(node.0) as u64
    }

    fn replace_text(&mut self, node: NodeId, segments: &[Segment]) -> Result<Vec<NodeId>, TreeError> {
        let payload =
            serde_wasm_bindgen::to_value(segments).map_err(|e| TreeError::Host(e.to_string()))?;
        let created = self.host_replace_text(node.0, payload).map_err(host_error)?;
        decode_nodes(created)
    }

    fn find_annotation(&self, id: &str) -> Option<NodeId> {
        self.host_find_annotation(id).map(NodeId)
    }

    fn unwrap_annotation(&mut self, wrapper: NodeId, text: &str) -> Result<NodeId, TreeError> {
        self.host_unwrap_annotation(wrapper.0, text)
            .map(NodeId)
            .map_err(host_error)
    }
}

fn to_js<E: std::fmt::Display>(e: E) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Keyword annotation engine bound to a JS document host
#[wasm_bindgen]
pub struct KeywordEngine {
    inner: AnnotationEngine<JsTreeHost, InstantClock>,
}

#[wasm_bindgen]
impl KeywordEngine {
    /// `options` may be omitted; see `EngineOptions` for the fields
    #[wasm_bindgen(constructor)]
    pub fn new(host: JsTreeHost, options: JsValue) -> Result<KeywordEngine, JsValue> {
        let options: EngineOptions = if options.is_undefined() || options.is_null() {
            EngineOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(to_js)?
        };
        Ok(KeywordEngine {
            inner: AnnotationEngine::new(host, InstantClock::new(), options),
        })
    }

    /// Apply a configuration object; returns a `CommandResponse`.
    /// `busy` is set when a pass is still running.
    #[wasm_bindgen(js_name = applyConfiguration)]
    pub fn apply_configuration(&mut self, config: JsValue) -> Result<JsValue, JsValue> {
        let config: Configuration = serde_wasm_bindgen::from_value(config).map_err(to_js)?;
        let response = self.inner.handle_command(Command::ApplyConfiguration { config });
        serde_wasm_bindgen::to_value(&response).map_err(to_js)
    }

    /// Remove every annotation; returns how many were removed
    #[wasm_bindgen(js_name = clearAll)]
    pub fn clear_all(&mut self) -> usize {
        self.inner.clear_all()
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.inner.remove(id)
    }

    /// Click handler for annotation wrappers
    #[wasm_bindgen(js_name = onInteraction)]
    pub fn on_interaction(&mut self, id: &str) -> bool {
        self.inner.handle_interaction(id)
    }

    /// Forward MutationObserver batches as `ChangeRecord[]`
    #[wasm_bindgen(js_name = notifyMutations)]
    pub fn notify_mutations(&mut self, records: JsValue) -> Result<usize, JsValue> {
        let records: Vec<ChangeRecord> = serde_wasm_bindgen::from_value(records).map_err(to_js)?;
        Ok(self.inner.notify_mutations(&records))
    }

    /// Run one unit of work; call from requestAnimationFrame or a timer
    pub fn step(&mut self) -> Result<JsValue, JsValue> {
        let outcome = self.inner.step();
        serde_wasm_bindgen::to_value(&outcome).map_err(to_js)
    }

    #[wasm_bindgen(js_name = runUntilIdle)]
    pub fn run_until_idle(&mut self) -> Result<JsValue, JsValue> {
        let report = self.inner.run_until_idle();
        serde_wasm_bindgen::to_value(&report).map_err(to_js)
    }

    /// Messaging entry point: `{ action: "updateSettings" | "applyConfiguration" | "clearHighlights", ... }`
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, message: JsValue) -> Result<JsValue, JsValue> {
        let command: Command = serde_wasm_bindgen::from_value(message).map_err(to_js)?;
        let response = self.inner.handle_command(command);
        serde_wasm_bindgen::to_value(&response).map_err(to_js)
    }

    /// `handleMessage` that runs an accepted apply to completion before answering
    #[wasm_bindgen(js_name = handleMessageSync)]
    pub fn handle_message_sync(&mut self, message: JsValue) -> Result<JsValue, JsValue> {
        let command: Command = serde_wasm_bindgen::from_value(message).map_err(to_js)?;
        let response = self.inner.handle_command_sync(command);
        serde_wasm_bindgen::to_value(&response).map_err(to_js)
    }

    #[wasm_bindgen(js_name = annotationCount)]
    pub fn annotation_count(&self) -> usize {
        self.inner.annotation_count()
    }

    /// "idle" or "scanning"
    #[wasm_bindgen(js_name = stateName)]
    pub fn state_name(&self) -> String {
        self.inner.state_name().to_string()
    }

    #[wasm_bindgen(js_name = lastReport)]
    pub fn last_report(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.last_report()).map_err(to_js)
    }

    /// Called with a `ScanReport` after each completed pass
    #[wasm_bindgen(js_name = setCompletionListener)]
    pub fn set_completion_listener(&mut self, callback: js_sys::Function) {
        self.inner.set_completion_listener(move |report| {
            let value = match serde_wasm_bindgen::to_value(report) {
                Ok(value) => value,
                Err(e) => {
                    diagnostics::error("KeywordEngine", &e);
                    return;
                }
            };
            if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                diagnostics::warn("KeywordEngine", format!("completion listener threw: {:?}", e));
            }
        });
    }
}
