//! HTTP application wiring, one router per demo process.
//!
//! - `routes/`: HTTP routes + handlers (one file per demo)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use axum::{routing::get, Extension, Router};
use webshim_agent::{envelope_router, AgentConfig};

use crate::context::{CatalogContext, StreamContext, TaskContext};
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// `hello`: a greeting on `/` plus the health probe.
pub fn build_hello_app() -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::hello::router())
}

/// `background-tasks`: every response closes the request's batch of deferred work.
pub fn build_tasks_app(ctx: TaskContext) -> Router {
    let queue = ctx.queue().clone();

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::hello::router())
        .nest("/tasks", routes::tasks::router())
        .layer(Extension(ctx))
        .layer(axum::middleware::from_fn_with_state(
            queue,
            middleware::mark_done_middleware,
        ))
}

/// `agent-actions`: storage routes reachable directly or through agent envelopes.
pub fn build_agent_app(ctx: CatalogContext, agent: AgentConfig) -> Router {
    let inner = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::storage::router())
        .layer(Extension(ctx));

    envelope_router(inner, agent)
}

/// `streaming`: chunked text responses.
pub fn build_streaming_app(ctx: StreamContext) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::streaming::router())
        .layer(Extension(ctx))
}
