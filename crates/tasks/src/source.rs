//! Invocation signal sources.
//!
//! The runner only starts draining deferred work after a source reports that
//! an invocation began. On Lambda that is the Extensions API (`extension`);
//! locally every wait returns immediately.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Lifecycle event delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "eventType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationEvent {
    #[serde(rename_all = "camelCase")]
    Invoke {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        deadline_ms: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    Shutdown {
        #[serde(default)]
        shutdown_reason: Option<String>,
        #[serde(default)]
        deadline_ms: Option<u64>,
    },
}

impl InvocationEvent {
    pub fn invoke(request_id: impl Into<String>) -> Self {
        Self::Invoke {
            request_id: Some(request_id.into()),
            deadline_ms: None,
        }
    }

    pub fn shutdown(reason: impl Into<String>) -> Self {
        Self::Shutdown {
            shutdown_reason: Some(reason.into()),
            deadline_ms: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("runtime api request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("runtime api returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("runtime api response is missing the {0} header")]
    MissingHeader(&'static str),

    #[error("invalid event payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The source will never produce another event.
    #[error("invocation source closed")]
    Closed,
}

impl InvocationError {
    /// Whether waiting and asking again can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Something that can block until the next invocation starts.
#[async_trait]
pub trait InvocationSource: Send + 'static {
    async fn next_invocation(&mut self) -> Result<InvocationEvent, InvocationError>;
}

/// Source for processes not running under Lambda: every invocation starts
/// immediately, so deferred work runs as soon as its batch is marked done.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSource;

#[async_trait]
impl InvocationSource for LocalSource {
    async fn next_invocation(&mut self) -> Result<InvocationEvent, InvocationError> {
        Ok(InvocationEvent::Invoke {
            request_id: None,
            deadline_ms: None,
        })
    }
}

/// Source driven by an in-process [`InvocationTrigger`].
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<InvocationEvent>,
}

/// Sending half of a [`ChannelSource`].
///
/// Dropping every trigger closes the source, which stops the runner after its
/// queue has been drained.
#[derive(Debug, Clone)]
pub struct InvocationTrigger {
    tx: mpsc::UnboundedSender<InvocationEvent>,
}

/// Create a connected trigger/source pair.
pub fn channel() -> (InvocationTrigger, ChannelSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InvocationTrigger { tx }, ChannelSource { rx })
}

impl InvocationTrigger {
    /// Signal the start of an invocation. Returns false if the source is gone.
    pub fn invoke(&self, request_id: impl Into<String>) -> bool {
        self.tx.send(InvocationEvent::invoke(request_id)).is_ok()
    }

    /// Signal platform shutdown. Returns false if the source is gone.
    pub fn shutdown(&self, reason: impl Into<String>) -> bool {
        self.tx.send(InvocationEvent::shutdown(reason)).is_ok()
    }
}

#[async_trait]
impl InvocationSource for ChannelSource {
    async fn next_invocation(&mut self) -> Result<InvocationEvent, InvocationError> {
        self.rx.recv().await.ok_or(InvocationError::Closed)
    }
}
