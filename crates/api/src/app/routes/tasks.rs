use std::time::{Duration, Instant};

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use webshim_tasks::RunnerStats;

use crate::context::TaskContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_tasks))
        .route("/stats", get(stats))
}

/// POST /tasks
///
/// Defers two mock tasks (2 and 3 time units) and answers right away; the
/// tasks run once this request's response has been produced.
pub async fn create_tasks(Extension(ctx): Extension<TaskContext>) -> impl IntoResponse {
    let unit = ctx.time_unit();
    for units in [2, 3] {
        ctx.queue()
            .enqueue(format!("mock_task({units})"), move || mock_task(units, unit));
    }
    info!(pending = ctx.queue().pending(), "deferred mock tasks");

    (StatusCode::CREATED, Json("task created"))
}

/// GET /tasks/stats
pub async fn stats(Extension(ctx): Extension<TaskContext>) -> Json<RunnerStats> {
    Json(ctx.stats().snapshot())
}

/// Stand-in for slow post-response work: sleeps `units` time units.
pub fn mock_task(units: u32, unit: Duration) -> anyhow::Result<()> {
    let started = Instant::now();
    std::thread::sleep(unit * units);
    info!(
        units,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "mock task finished"
    );
    Ok(())
}
