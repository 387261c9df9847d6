use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ObjectCountQuery {
    pub bucket_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetObjectRequest {
    pub bucket_name: String,
    pub object_key: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct LastModifiedResponse {
    pub last_modified: DateTime<Utc>,
}
