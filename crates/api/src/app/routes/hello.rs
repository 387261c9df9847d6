use axum::{routing::get, Json, Router};

use crate::app::dto::MessageResponse;

pub fn router() -> Router {
    Router::new().route("/", get(hello).post(hello))
}

pub async fn hello() -> Json<MessageResponse> {
    Json(MessageResponse { message: "Hello World" })
}
