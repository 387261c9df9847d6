use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::app::routes::storage::CatalogError;

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::BucketNotFound(_) => json_error(StatusCode::NOT_FOUND, "bucket_not_found", err.to_string()),
        CatalogError::ObjectNotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, "object_not_found", err.to_string())
        }
        CatalogError::Unavailable(msg) => json_error(StatusCode::BAD_GATEWAY, "storage_unavailable", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Reject a required field that was supplied but empty.
pub fn require_non_empty<'a>(field: &'static str, value: &'a str) -> Result<&'a str, axum::response::Response> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("{field} must not be empty"),
        ));
    }
    Ok(trimmed)
}
