//! Diagnostic logging
//!
//! Browser builds write `[Context] message` lines to the devtools console.
//! Native builds (hosts, tests) route the same lines through `tracing`.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Debug,
    Warn,
    Error,
}

pub fn error(context: &str, message: impl Display) {
    emit(Level::Error, context, message);
}

pub fn warn(context: &str, message: impl Display) {
    emit(Level::Warn, context, message);
}

pub fn debug(context: &str, message: impl Display) {
    emit(Level::Debug, context, message);
}

#[cfg(target_arch = "wasm32")]
fn emit(level: Level, context: &str, message: impl Display) {
    let line = wasm_bindgen::JsValue::from_str(&format!("[{}] {}", context, message));
    match level {
        Level::Error => web_sys::console::error_1(&line),
        Level::Warn => web_sys::console::warn_1(&line),
        Level::Debug => web_sys::console::debug_1(&line),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(level: Level, context: &str, message: impl Display) {
    match level {
        Level::Error => tracing::error!(context = context, "{}", message),
        Level::Warn => tracing::warn!(context = context, "{}", message),
        Level::Debug => tracing::debug!(context = context, "{}", message),
    }
}
