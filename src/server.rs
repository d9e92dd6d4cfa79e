use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::CredentialStore;
use crate::telegram::{SendOutcome, TelegramClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    credentials: Arc<CredentialStore>,
    telegram: Arc<TelegramClient>,
    allowed_origin: HeaderValue,
}

impl AppState {
    pub fn new(
        credentials: CredentialStore,
        telegram: TelegramClient,
        allowed_origin: &str,
    ) -> Result<Self> {
        let allowed_origin = HeaderValue::from_str(allowed_origin)
            .with_context(|| format!("Invalid allowed origin: {allowed_origin}"))?;
        Ok(Self {
            credentials: Arc::new(credentials),
            telegram: Arc::new(telegram),
            allowed_origin,
        })
    }
}

/// Inbound send intent. The required fields stay `Option` so their absence
/// is a validation error (400) rather than a deserialization error.
#[derive(Debug, Deserialize)]
struct SendRequest {
    bot_name: Option<String>,
    channel_id: Option<String>,
    message: Option<String>,
    #[serde(default = "default_parse_mode")]
    parse_mode: String,
}

fn default_parse_mode() -> String {
    "Markdown".to_string()
}

#[derive(Debug, Serialize)]
struct RelaySuccess {
    success: bool,
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct RelayError {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Wrong-method requests on /send fall through to 404, not 405.
        .route("/send", post(handle_send).fallback(handle_not_found))
        .route("/test", any(handle_test))
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .with_state(state)
}

/// Answers browser preflight before routing and stamps the CORS headers on
/// every response the relay emits.
async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(&mut response, &state.allowed_origin);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(&mut response, &state.allowed_origin);
    response
}

fn apply_cors_headers(response: &mut Response, origin: &HeaderValue) {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

async fn handle_test() -> &'static str {
    "Worker is alive!"
}

async fn handle_not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// The relay operation: parse, validate, resolve the credential, make the
/// one upstream call, map its outcome back to the caller.
async fn handle_send(State(state): State<AppState>, body: Bytes) -> Response {
    // Read the raw body so a malformed payload surfaces as an unexpected
    // failure (500) while a missing field stays a validation error (400).
    let request: SendRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("Unreadable request body: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None);
        }
    };

    let (bot_name, channel_id, message) = match (
        non_empty(request.bot_name.as_deref()),
        non_empty(request.channel_id.as_deref()),
        non_empty(request.message.as_deref()),
    ) {
        (Some(bot_name), Some(channel_id), Some(message)) => (bot_name, channel_id, message),
        _ => {
            return error_response(StatusCode::BAD_REQUEST, "Missing required fields", None);
        }
    };

    let Some(token) = state.credentials.token_for(bot_name) else {
        error!("No credential configured for bot '{}'", bot_name);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Bot token not found for {bot_name}"),
            None,
        );
    };

    match state
        .telegram
        .send_message(token, channel_id, message, &request.parse_mode)
        .await
    {
        Ok(SendOutcome::Sent { message_id }) => {
            info!(
                "Relayed message {} to chat {} via bot '{}'",
                message_id, channel_id, bot_name
            );
            let response = RelaySuccess {
                success: true,
                message_id,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(SendOutcome::Rejected {
            status,
            description,
        }) => {
            warn!(
                "Telegram rejected send via bot '{}' ({}): {}",
                bot_name, status, description
            );
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, "Telegram API error", Some(description))
        }
        Err(e) => {
            error!("Upstream call failed: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn error_response(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Response {
    let body = RelayError {
        error: error.into(),
        details,
    };
    (status, Json(body)).into_response()
}
