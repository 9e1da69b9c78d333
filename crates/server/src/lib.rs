//! Medication Reminder Server
//!
//! Provides the HTTP surface for initiating reminder calls and receiving the
//! provider's webhook callbacks, the keyed call registry, and the
//! orchestrator that drives the call flow around the state machine.

pub mod auth;
pub mod http;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod state;

pub use http::create_router;
pub use metrics::init_metrics;
pub use orchestrator::{ReminderOrchestrator, StartedReminder};
pub use registry::{CallRegistry, SharedCall};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use medcall_telephony::TelephonyError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Missing or malformed caller input; surfaced to the initiating client.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider refused or failed to place the call; aborts this attempt
    /// only.
    #[error("provider error: {0}")]
    Provider(#[from] TelephonyError),

    /// The registry is at capacity.
    #[error("call registry full")]
    Capacity,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Provider(_) => StatusCode::BAD_GATEWAY,
            ServerError::Capacity => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
