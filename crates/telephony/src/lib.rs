//! Telephony provider gateway
//!
//! Thin I/O wrapper around the provider: outbound call placement over its
//! REST API, the voice markup (TwiML) it executes, the webhook payloads it
//! posts back, and webhook signature validation. All call-flow decisions
//! live elsewhere.

pub mod gateway;
pub mod signature;
pub mod twiml;
pub mod webhook;

pub use gateway::{CallGateway, TwilioGateway};
pub use signature::validate_signature;
pub use twiml::VoiceResponse;
pub use webhook::{GatherResult, StatusCallback};

use thiserror::Error;

/// Telephony errors
#[derive(Error, Debug)]
pub enum TelephonyError {
    #[error("telephony provider not configured")]
    NotConfigured,

    #[error("provider API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
