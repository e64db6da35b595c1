//! Error types for the annotation engine
//!
//! Nothing here is fatal: pattern errors degrade to "no matcher", tree errors
//! skip one unit, busy errors are handed back to the caller.

use crate::tree::NodeId;

/// Failure while building a compiled pattern
#[derive(Debug, Clone, PartialEq)]
pub enum PatternError {
    /// The alternation exceeded the compiled size limit
    TooLarge,
    Invalid(String),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::TooLarge => write!(f, "Keyword pattern exceeds size limit"),
            PatternError::Invalid(msg) => write!(f, "Invalid keyword pattern: {}", msg),
        }
    }
}

impl std::error::Error for PatternError {}

/// A wrap or unwrap against the host tree failed
#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    /// Node is no longer attached to the document
    Detached(NodeId),
    NotText(NodeId),
    NotAnnotation(NodeId),
    /// Error reported by the host implementation
    Host(String),
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::Detached(node) => write!(f, "Node {} is detached", node),
            TreeError::NotText(node) => write!(f, "Node {} is not a text node", node),
            TreeError::NotAnnotation(node) => {
                write!(f, "Node {} is not an annotation wrapper", node)
            }
            TreeError::Host(msg) => write!(f, "Host tree error: {}", msg),
        }
    }
}

impl std::error::Error for TreeError {}

/// Engine-level errors surfaced to callers. Pattern and tree failures are
/// absorbed where they occur (logged, unit skipped), so only scheduling
/// conflicts reach the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A pass is in flight; the command was ignored
    Busy { generation: u64 },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Busy { generation } => {
                write!(f, "Engine busy with scan pass {}", generation)
            }
        }
    }
}

impl std::error::Error for EngineError {}
