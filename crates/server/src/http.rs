//! HTTP Endpoints
//!
//! The initiation API plus the webhook surface the provider calls back into.
//! Webhook handlers always answer 200 with voice markup; errors there are
//! spoken to the patient, not returned to the provider.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use medcall_core::CallId;
use medcall_telephony::{GatherResult, StatusCallback};

use crate::auth::verify_webhook_signature;
use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.settings.server.cors_origins,
        state.settings.server.cors_enabled,
    );

    let webhooks = Router::new()
        .route("/voice-webhook", get(voice_webhook).post(voice_webhook))
        .route("/handle-response", post(handle_response))
        .route("/call-status", post(call_status))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            verify_webhook_signature,
        ));

    Router::new()
        // Initiation API
        .route("/make-call", post(make_call))
        // Provider webhook surface
        .merge(webhooks)
        // Health and observability
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.settings.server.timeout_seconds,
        )))
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Initiation request
#[derive(Debug, Deserialize)]
struct MakeCallRequest {
    phone: Option<String>,
    medicine_name: Option<String>,
}

/// Initiation response
#[derive(Debug, Serialize)]
struct MakeCallResponse {
    success: bool,
    call_sid: String,
    message: String,
}

/// Start a reminder call
async fn make_call(
    State(state): State<AppState>,
    Json(request): Json<MakeCallRequest>,
) -> Result<Json<MakeCallResponse>, ServerError> {
    let phone = request.phone.unwrap_or_default();
    let started = state
        .orchestrator
        .start_reminder(&phone, request.medicine_name)
        .await?;

    Ok(Json(MakeCallResponse {
        success: true,
        call_sid: started.provider_ref,
        message: format!("Voice call initiated to {}", started.phone_number),
    }))
}

/// Correlation token carried in webhook query strings
#[derive(Debug, Deserialize)]
struct CallQuery {
    call: Option<String>,
}

/// Serve the reminder prompt when the provider connects the call
async fn voice_webhook(
    State(state): State<AppState>,
    Query(params): Query<CallQuery>,
) -> impl IntoResponse {
    let xml = match params.call {
        Some(id) => state.orchestrator.deliver_prompt(&CallId::from(id)),
        None => state.orchestrator.unavailable_closing(),
    };
    xml_response(xml)
}

/// Process the patient's keypress or speech
async fn handle_response(
    State(state): State<AppState>,
    Query(params): Query<CallQuery>,
    Form(gather): Form<GatherResult>,
) -> impl IntoResponse {
    let xml = match params.call {
        Some(id) => state.orchestrator.handle_response(
            &CallId::from(id),
            gather.digits.as_deref(),
            gather.speech_result.as_deref(),
        ),
        None => state.orchestrator.unavailable_closing(),
    };
    xml_response(xml)
}

/// Bookkeeping for provider status updates; always acknowledged
async fn call_status(
    State(state): State<AppState>,
    Query(params): Query<CallQuery>,
    Form(status): Form<StatusCallback>,
) -> StatusCode {
    if let Some(id) = params.call {
        state.orchestrator.handle_status(&CallId::from(id), &status);
    } else {
        tracing::warn!(provider_ref = %status.call_sid, "status callback without correlation token");
    }
    StatusCode::OK
}

fn xml_response(xml: String) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/xml"))],
        xml,
    )
}

/// Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "active_calls": state.registry.count(),
    }))
}

/// Prometheus exposition
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use medcall_config::{ProviderConfig, Settings};
    use medcall_telephony::TwilioGateway;

    #[test]
    fn test_router_creation() {
        let gateway = Arc::new(TwilioGateway::new(ProviderConfig::default()));
        let state = AppState::new(Settings::default(), gateway, None);
        let _ = create_router(state);
    }
}
