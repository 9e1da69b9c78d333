//! Core types for the medication reminder service
//!
//! This crate provides the foundational types used across all other crates:
//! - The reminder call record and its correlation token
//! - The call lifecycle state graph
//! - The yes/no decision type produced by response classification
//! - Transition error types

pub mod call;
pub mod decision;
pub mod error;

pub use call::{CallId, CallState, ReminderCall, DEFAULT_MEDICINE_PHRASE};
pub use decision::Decision;
pub use error::CallError;
