//! Error types for call record mutation

use thiserror::Error;

use crate::call::CallState;

/// Errors raised by the call record itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The requested move is not an edge of the state graph.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: CallState, to: CallState },
}
