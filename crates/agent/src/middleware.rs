use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::envelope::{ActionInvocation, ActionResponseEnvelope};
use crate::rewrite::{rewrite_request, RewriteError};

pub const DEFAULT_INVOCATION_PATH: &str = "/events";

/// Content type reported when the inner response does not declare one.
pub const FALLBACK_CONTENT_TYPE: &str = "application/json";

/// Largest envelope accepted, in bytes.
const DEFAULT_ENVELOPE_LIMIT: usize = 6 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Only requests to this exact path are treated as envelopes.
    pub invocation_path: String,
    pub envelope_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            invocation_path: DEFAULT_INVOCATION_PATH.to_string(),
            envelope_limit: DEFAULT_ENVELOPE_LIMIT,
        }
    }
}

impl AgentConfig {
    pub fn with_invocation_path(mut self, path: impl Into<String>) -> Self {
        self.invocation_path = path.into();
        self
    }
}

/// Wrap `router` so envelopes posted to the invocation path are dispatched
/// to the route they describe.
///
/// The rewrite has to happen before routing, so the middleware sits on an
/// outer router whose only job is to hand everything to `router`.
pub fn envelope_router(router: Router, config: AgentConfig) -> Router {
    Router::new()
        .fallback_service(router)
        .layer(axum::middleware::from_fn_with_state(config, agent_envelope))
}

/// Envelope middleware. Requests to any other path pass through untouched.
pub async fn agent_envelope(State(config): State<AgentConfig>, req: Request, next: Next) -> Response {
    if req.uri().path() != config.invocation_path {
        return next.run(req).await;
    }

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, config.envelope_limit).await {
        Ok(b) => b,
        Err(e) => return RewriteError::Body(e.to_string()).into_response(),
    };

    let invocation: ActionInvocation = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "rejected malformed agent envelope");
            return RewriteError::from(e).into_response();
        }
    };

    let rewritten = match rewrite_request(parts, &invocation) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, action_group = %invocation.action_group, "agent envelope could not be rewritten");
            return e.into_response();
        }
    };

    info!(
        action_group = %invocation.action_group,
        api_path = %invocation.api_path,
        http_method = %invocation.http_method,
        "dispatching agent action"
    );

    let response = next.run(rewritten).await;
    let (parts, body) = response.into_parts();

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string();

    // Streamed bodies are buffered in full before wrapping.
    let body = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, action_group = %invocation.action_group, "agent action response body failed");
            return json_error(StatusCode::BAD_GATEWAY, "inner_response_failed", e.to_string());
        }
    };
    let text = String::from_utf8_lossy(&body).into_owned();
    debug!(status = parts.status.as_u16(), body = %text, "agent action response");

    Json(ActionResponseEnvelope::wrap(
        &invocation,
        parts.status.as_u16(),
        &content_type,
        text,
    ))
    .into_response()
}

fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
