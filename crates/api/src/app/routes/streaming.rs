//! Chunked text responses.
//!
//! Bodies are lazy streams: a chunk is produced only when the connection
//! polls for it, and a client hanging up drops the stream with its pending
//! sleep.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    body::Body,
    extract::Extension,
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use tracing::debug;
use uuid::Uuid;

use crate::context::StreamContext;

pub const LINE: &str = "This is streaming from Lambda \n";
pub const LINE_COUNT: usize = 10;

pub fn router() -> Router {
    Router::new()
        .route("/", get(stream_lines))
        .route("/lmi", get(stream_chars))
}

/// GET /
///
/// Ten identical lines, each preceded by one line interval.
pub async fn stream_lines(Extension(ctx): Extension<StreamContext>) -> impl IntoResponse {
    text_body(line_stream(ctx.line_interval))
}

/// GET /lmi
///
/// A message tagged with a fresh short id, sent one character at a time so
/// concurrent responses can be told apart.
pub async fn stream_chars(Extension(ctx): Extension<StreamContext>) -> impl IntoResponse {
    let request_id = short_id();
    debug!(%request_id, "starting character stream");

    text_body(char_stream(tagged_message(&request_id), ctx.char_interval))
}

/// `LINE_COUNT` copies of `LINE`, each after a pause of `interval`.
pub fn line_stream(interval: Duration) -> impl Stream<Item = Result<&'static str, Infallible>> + Send + 'static {
    stream::unfold(0usize, move |sent| async move {
        if sent == LINE_COUNT {
            return None;
        }
        tokio::time::sleep(interval).await;
        Some((Ok(LINE), sent + 1))
    })
}

/// The characters of `message` one by one, `pause` apart.
pub fn char_stream(message: String, pause: Duration) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    let chars: Vec<char> = message.chars().collect();

    stream::unfold((chars.into_iter(), true), move |(mut rest, first)| async move {
        let ch = rest.next()?;
        if !first {
            tokio::time::sleep(pause).await;
        }
        Some((Ok(ch.to_string()), (rest, false)))
    })
}

fn text_body<S, T>(chunks: S) -> impl IntoResponse
where
    S: Stream<Item = Result<T, Infallible>> + Send + 'static,
    T: Into<axum::body::Bytes> + 'static,
{
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], Body::from_stream(chunks))
}

/// First eight characters of a random UUID.
pub fn short_id() -> String {
    let mut id = Uuid::new_v4().to_string();
    id.truncate(8);
    id
}

pub fn tagged_message(request_id: &str) -> String {
    format!("[{request_id}] This is streaming from Lambda Managed Instances!\n")
}
