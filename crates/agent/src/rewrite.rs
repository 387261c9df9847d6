//! Envelope → HTTP request rewriting.

use axum::{
    body::Body,
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING},
        request::Parts,
        HeaderValue, Method, Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::envelope::{ActionInvocation, MediaContent, Parameter, RequestBody};

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("request body could not be read: {0}")]
    Body(String),

    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("invalid http method: {0:?}")]
    Method(String),

    #[error("invalid api path {path:?}: {reason}")]
    Path { path: String, reason: String },

    #[error("invalid content type {0:?}")]
    ContentType(String),

    #[error("query parameters could not be encoded: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),
}

impl IntoResponse for RewriteError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_envelope",
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// URL-encode the parameters as a query string.
///
/// A later parameter with the same name replaces an earlier one in place.
pub fn query_string<'a>(params: impl IntoIterator<Item = &'a Parameter>) -> Result<String, RewriteError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for param in params {
        let value = param.value_text();
        match pairs.iter_mut().find(|(name, _)| *name == param.name) {
            Some(existing) => existing.1 = value,
            None => pairs.push((param.name.clone(), value)),
        }
    }
    Ok(serde_urlencoded::to_string(&pairs)?)
}

/// JSON body built from the first declared content type, with that type.
///
/// `None` when the envelope declares no body content.
pub fn body_from_content(body: &RequestBody) -> Result<Option<(String, Vec<u8>)>, RewriteError> {
    let Some((content_type, media)) = body.content.iter().next() else {
        return Ok(None);
    };

    let media: MediaContent = serde_json::from_value(media.clone())?;
    let mut object = Map::new();
    for property in media.properties {
        object.insert(property.name, property.value);
    }

    let bytes = serde_json::to_vec(&Value::Object(object))?;
    Ok(Some((content_type.clone(), bytes)))
}

/// Fill `{name}` placeholders of the api path from the parameters.
///
/// Returns the concrete path and the parameters that were not consumed.
pub fn resolve_path<'a>(api_path: &str, params: &'a [Parameter]) -> (String, Vec<&'a Parameter>) {
    let mut path = api_path.to_string();
    let mut rest = Vec::with_capacity(params.len());

    for param in params {
        let placeholder = format!("{{{}}}", param.name);
        if path.contains(&placeholder) {
            path = path.replace(&placeholder, &encode_path_segment(&param.value_text()));
        } else {
            rest.push(param);
        }
    }

    (path, rest)
}

/// Rewrite the envelope request into the request it describes.
///
/// Headers other than the body framing ones are carried over unchanged.
pub fn rewrite_request(mut parts: Parts, invocation: &ActionInvocation) -> Result<Request<Body>, RewriteError> {
    parts.method = Method::from_bytes(invocation.http_method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| RewriteError::Method(invocation.http_method.clone()))?;

    let (path, query_params) = resolve_path(&invocation.api_path, &invocation.parameters);
    if !path.starts_with('/') {
        return Err(RewriteError::Path {
            path: invocation.api_path.clone(),
            reason: "must start with '/'".to_string(),
        });
    }

    let query = query_string(query_params)?;
    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    };
    parts.uri = path_and_query
        .parse::<Uri>()
        .map_err(|e| RewriteError::Path {
            path: invocation.api_path.clone(),
            reason: e.to_string(),
        })?;

    parts.headers.remove(TRANSFER_ENCODING);
    let body = match invocation.request_body.as_ref().map(body_from_content).transpose()?.flatten() {
        Some((content_type, bytes)) => {
            let value = HeaderValue::from_str(&content_type)
                .map_err(|_| RewriteError::ContentType(content_type.clone()))?;
            parts.headers.insert(CONTENT_TYPE, value);
            parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            Body::from(bytes)
        }
        None => {
            parts.headers.remove(CONTENT_TYPE);
            parts.headers.remove(CONTENT_LENGTH);
            Body::empty()
        }
    };

    Ok(Request::from_parts(parts, body))
}

fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
