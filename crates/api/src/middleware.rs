use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use webshim_tasks::TaskQueue;

/// Close the current request's batch of deferred work once the inner service
/// has produced its response.
///
/// Runs for every request, including ones that deferred nothing, so the
/// worker can finish the invocation.
pub async fn mark_done_middleware(State(queue): State<TaskQueue>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    queue.mark_done();
    response
}
