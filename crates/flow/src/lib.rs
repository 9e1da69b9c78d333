//! Call-flow decision core
//!
//! Features:
//! - Classification of keypress/speech input into a binary decision
//! - The state machine advancing one reminder call per provider callback
//!
//! Everything here is synchronous and free of I/O; callers own locking and
//! scheduling.

pub mod classifier;
pub mod machine;

pub use classifier::ResponseClassifier;
pub use machine::CallFlow;

use thiserror::Error;

use medcall_core::{CallError, CallId, CallState};

/// Flow errors
#[derive(Error, Debug)]
pub enum FlowError {
    /// A callback arrived in an order the state graph forbids.
    #[error(transparent)]
    Transition(#[from] CallError),

    /// A late or duplicate callback for a call that has already moved on.
    /// Recoverable: acknowledged without any state change.
    #[error("stale callback for call {call_id} in state {state}")]
    StaleCallback { call_id: CallId, state: CallState },
}

impl FlowError {
    /// Stale callbacks are acknowledged, not surfaced as failures.
    pub fn is_stale(&self) -> bool {
        matches!(self, FlowError::StaleCallback { .. })
    }
}
