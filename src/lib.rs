//! KittMark: in-page keyword highlighting and hiding
//!
//! A Rust/WASM engine that finds user-configured keywords in the visible text
//! of a live document and wraps each occurrence in a highlight or hide
//! annotation, keeping up with the page as it changes.
//!
//! # Architecture
//!
//! ## Core
//! - `pattern.rs` - Pattern: keyword list → one case-aware alternation regex
//! - `scanner.rs` - TreeWalker: resumable walk over eligible text units
//! - `annotator.rs` - Annotator: splits a text unit around matches, commits wrappers
//! - `registry.rs` - AnnotationRegistry: id → annotation, removal and clear
//! - `tracker.rs` - UnitTracker: visited (node, revision) keys for idempotency
//! - `scheduler.rs` - Scheduler: chunked passes, debounce, generations
//! - `engine/` - AnnotationEngine: coordinates all of the above
//!
//! ## Host boundary
//! - `tree/` - TreeSource trait and the in-memory `MemoryTree`
//! - `clock.rs` - Clock trait (`InstantClock`, `ManualClock`)
//! - `wasm.rs` - `JsTreeHost` import and the `KeywordEngine` export
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { KeywordEngine } from 'kittmark';
//!
//! await init();
//!
//! const engine = new KeywordEngine(domHost, { chunkSize: 50 });
//! engine.setCompletionListener((report) => console.log(report.matchCount));
//! engine.handleMessage({
//!   action: 'updateSettings',
//!   settings: { keywords: 'cat, dog', selectedColor: '#ffeb3b', highlightMode: true },
//! });
//!
//! function frame() {
//!   const outcome = engine.step();
//!   if (outcome.state !== 'idle') requestAnimationFrame(frame);
//! }
//! requestAnimationFrame(frame);
//! ```

pub mod annotator;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod message;
pub mod pattern;
pub mod registry;
pub mod scanner;
pub mod scheduler;
pub mod tracker;
pub mod tree;
pub mod wasm;

// Public exports
pub use clock::{Clock, InstantClock, ManualClock};
pub use config::{Configuration, EngineOptions, Mode, SettingsSource, StoredSettings};
pub use engine::{AnnotationEngine, ApplyOutcome};
pub use error::{EngineError, PatternError, TreeError};
pub use message::{Command, CommandResponse, SettingsUpdate};
pub use pattern::Pattern;
pub use registry::{Annotation, AnnotationRegistry};
pub use scheduler::{ChangeRecord, PassKind, ScanReport, StepOutcome};
pub use tree::{MemoryTree, NodeId, NodeKind, Segment, TreeSource, WrapperSpec};
pub use wasm::{JsTreeHost, KeywordEngine};

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("kittmark v{}", env!("CARGO_PKG_VERSION"))
}
