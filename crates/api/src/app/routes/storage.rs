//! Object-storage queries for the `agent-actions` demo.
//!
//! Storage is reached through [`BucketCatalog`] so the handlers can be served
//! from memory locally and in tests.

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::app::dto::{CountResponse, GetObjectRequest, LastModifiedResponse, ObjectCountQuery};
use crate::app::errors::{self, catalog_error_to_response, json_error};
use crate::context::CatalogContext;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("bucket {0:?} does not exist")]
    BucketNotFound(String),

    #[error("object {key:?} does not exist in bucket {bucket:?}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Read-only view of buckets and their objects.
pub trait BucketCatalog: Send + Sync {
    fn bucket_count(&self) -> CatalogResult<usize>;

    fn object_count(&self, bucket: &str) -> CatalogResult<usize>;

    fn object_last_modified(&self, bucket: &str, key: &str) -> CatalogResult<DateTime<Utc>>;
}

/// Catalog held entirely in memory. Fixed once built.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBucketCatalog {
    buckets: BTreeMap<String, BTreeMap<String, DateTime<Utc>>>,
}

impl InMemoryBucketCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.entry(bucket.into()).or_default();
        self
    }

    pub fn with_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        self.buckets
            .entry(bucket.into())
            .or_default()
            .insert(key.into(), last_modified);
        self
    }

    /// A few buckets to poke at when running locally.
    pub fn sample() -> Self {
        let now = Utc::now();
        Self::new()
            .with_object("reports", "2024/q1.csv", now - chrono::Duration::days(90))
            .with_object("reports", "2024/q2.csv", now - chrono::Duration::days(1))
            .with_object("assets", "logo.png", now)
            .with_bucket("scratch")
    }

    fn bucket(&self, bucket: &str) -> CatalogResult<&BTreeMap<String, DateTime<Utc>>> {
        self.buckets
            .get(bucket)
            .ok_or_else(|| CatalogError::BucketNotFound(bucket.to_string()))
    }
}

impl BucketCatalog for InMemoryBucketCatalog {
    fn bucket_count(&self) -> CatalogResult<usize> {
        Ok(self.buckets.len())
    }

    fn object_count(&self, bucket: &str) -> CatalogResult<usize> {
        Ok(self.bucket(bucket)?.len())
    }

    fn object_last_modified(&self, bucket: &str, key: &str) -> CatalogResult<DateTime<Utc>> {
        self.bucket(bucket)?
            .get(key)
            .copied()
            .ok_or_else(|| CatalogError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/s3_bucket_count", get(bucket_count))
        .route("/s3_object_count", get(object_count))
        .route("/s3_object", post(object_last_modified))
}

/// GET /s3_bucket_count
pub async fn bucket_count(Extension(ctx): Extension<CatalogContext>) -> axum::response::Response {
    match ctx.catalog().bucket_count() {
        Ok(count) => Json(CountResponse { count }).into_response(),
        Err(e) => catalog_error_to_response(e),
    }
}

/// GET /s3_object_count?bucket_name=...
pub async fn object_count(
    Extension(ctx): Extension<CatalogContext>,
    Query(query): Query<ObjectCountQuery>,
) -> axum::response::Response {
    let Some(raw) = query.bucket_name else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "bucket_name query parameter is required",
        );
    };
    let bucket = match errors::require_non_empty("bucket_name", &raw) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match ctx.catalog().object_count(bucket) {
        Ok(count) => {
            debug!(bucket, count, "counted objects");
            Json(CountResponse { count }).into_response()
        }
        Err(e) => catalog_error_to_response(e),
    }
}

/// POST /s3_object
///
/// Body: `{"bucket_name": "...", "object_key": "..."}`.
pub async fn object_last_modified(
    Extension(ctx): Extension<CatalogContext>,
    payload: Result<Json<GetObjectRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text());
        }
    };

    match ctx.catalog().object_last_modified(&req.bucket_name, &req.object_key) {
        Ok(last_modified) => Json(LastModifiedResponse { last_modified }).into_response(),
        Err(e) => catalog_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn in_memory_catalog_counts_and_looks_up() {
        let when = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let catalog = InMemoryBucketCatalog::new()
            .with_object("a", "x", when)
            .with_object("a", "y", when)
            .with_bucket("empty");

        assert_eq!(catalog.bucket_count().unwrap(), 2);
        assert_eq!(catalog.object_count("a").unwrap(), 2);
        assert_eq!(catalog.object_count("empty").unwrap(), 0);
        assert_eq!(catalog.object_last_modified("a", "x").unwrap(), when);
    }

    #[test]
    fn unknown_bucket_and_object_are_distinct_errors() {
        let catalog = InMemoryBucketCatalog::new().with_bucket("a");

        assert_eq!(
            catalog.object_count("nope"),
            Err(CatalogError::BucketNotFound("nope".to_string()))
        );
        assert!(matches!(
            catalog.object_last_modified("a", "missing"),
            Err(CatalogError::ObjectNotFound { .. })
        ));
    }
}
