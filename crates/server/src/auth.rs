//! Webhook authenticity middleware
//!
//! When enabled, every webhook request must carry a valid provider signature
//! (HMAC-SHA1 over the public URL and the sorted form parameters, keyed by
//! the auth token). The body is buffered once, verified, and handed back to
//! the route's typed extractor.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use medcall_telephony::validate_signature;

use crate::state::AppState;

/// Webhook form bodies are small; anything larger is not the provider.
const MAX_FORM_BYTES: usize = 64 * 1024;

const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

pub async fn verify_webhook_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.settings.provider.validate_signatures {
        return next.run(request).await;
    }

    let Some(signature) = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
    else {
        tracing::warn!(uri = %request.uri(), "webhook without signature header");
        return StatusCode::FORBIDDEN.into_response();
    };

    // The provider signs the public URL, not whatever host the request
    // reached us on.
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    let url = format!(
        "{}{}",
        state.settings.server.public_base_url.trim_end_matches('/'),
        path_and_query
    );

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(%err, "webhook body could not be read");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let params: BTreeMap<String, String> = if parts.method == Method::GET {
        BTreeMap::new()
    } else {
        match serde_urlencoded::from_bytes(&bytes) {
            Ok(params) => params,
            Err(err) => {
                tracing::warn!(%err, "webhook body is not a form");
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    };

    if !validate_signature(
        &state.settings.provider.auth_token,
        &url,
        &params,
        &signature,
    ) {
        tracing::warn!(%url, "webhook signature mismatch");
        return StatusCode::FORBIDDEN.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
