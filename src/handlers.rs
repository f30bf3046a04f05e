use crate::config::Config;
use crate::errors::AppError;
use crate::models::LeadForm;
use crate::notify::NotificationDispatcher;
use crate::rate_limit::FixedWindowLimiter;
use crate::validation::{validate_lead, ValidationErrors};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Per-client fixed-window rate limiter.
    pub limiter: FixedWindowLimiter,
    /// Best-effort fan-out to the configured delivery channels.
    pub dispatcher: NotificationDispatcher,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-intake-api",
            "version": "0.1.0"
        })),
    )
}

/// Extracts the client identifier used as the rate-limit key.
///
/// Prefers the first hop of `x-forwarded-for`, then `x-real-ip`, then the
/// `"unknown"` sentinel. Every keyless client shares the sentinel bucket.
fn client_key(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_hop) = forwarded.split(',').next() {
            let first_hop = first_hop.trim();
            if !first_hop.is_empty() {
                return first_hop.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    "unknown".to_string()
}

/// POST /api/lead
///
/// Lead intake endpoint. Flow:
/// 1. Resolve the client key (x-forwarded-for → x-real-ip → "unknown").
/// 2. Rate limit the key; over-limit clients get 429 before the body is read.
/// 3. Parse and validate the payload (every field checked, 400 on failure).
/// 4. Drop honeypot submissions silently (200, nothing dispatched).
/// 5. Fan out to the webhook and email channels, best effort.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `headers` - Request headers, used for client identification.
/// * `body` - Raw request body; parsed manually so rate limiting runs first.
///
/// # Returns
///
/// * `Result<Json<serde_json::Value>, AppError>` - `{"ok": true}` or the localized error.
pub async fn submit_lead(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Utc::now();

    // Step 1: Client identifier
    let key = client_key(&headers);

    // Step 2: Rate limit before any parsing; malformed bodies still count
    if !state.limiter.admit(&key, now) {
        tracing::warn!("⚠️  Rate limit exceeded for client: {}", key);
        return Err(AppError::RateLimited);
    }

    // Step 3: Parse + schema validation
    let form: LeadForm = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(ValidationErrors::malformed_body(e.to_string())))?;
    let lead = validate_lead(&form).map_err(AppError::Validation)?;

    // Step 4: Honeypot submissions are accepted and dropped
    if lead.is_spam() {
        tracing::info!("Honeypot triggered, ignoring submission");
        return Ok(Json(json!({ "ok": true })));
    }

    tracing::info!(
        "New lead received: {} <{}> phone={} utm_source={:?} utm_campaign={:?}",
        lead.full_name,
        lead.email,
        lead.phone,
        lead.utm_source,
        lead.utm_campaign
    );

    // Step 5: Best-effort fan-out; channel failures never reach the client
    state.dispatcher.dispatch(&lead, now).await;

    Ok(Json(json!({ "ok": true })))
}

/// GET /api/env-test
///
/// Delivery-configuration diagnostic. Reports the loaded configuration, not
/// the raw process environment; the SMTP password is reduced to a presence
/// flag.
pub async fn env_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let config = &state.config;

    Json(json!({
        "SMTP_HOST": config.smtp_host,
        "SMTP_PORT": config.smtp_port,
        "SMTP_USER": config.smtp_user,
        "HAS_SMTP_PASS": config.smtp_pass.is_some(),
        "LEAD_TO_EMAIL": config.to_email,
    }))
}
