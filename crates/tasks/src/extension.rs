//! Lambda Extensions API client.
//!
//! Registering as an internal extension makes the platform wait for us before
//! freezing the execution environment: an invocation only counts as finished
//! for the extension once it asks for the next event.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::source::{InvocationError, InvocationEvent, InvocationSource};

pub const EXTENSION_API_VERSION: &str = "2020-01-01";
pub const HEADER_EXTENSION_NAME: &str = "Lambda-Extension-Name";
pub const HEADER_EXTENSION_IDENTIFIER: &str = "Lambda-Extension-Identifier";

/// Lifecycle events requested at registration.
pub const REGISTERED_EVENTS: [&str; 1] = ["INVOKE"];

/// A registered extension, ready to wait for lifecycle events.
#[derive(Debug, Clone)]
pub struct ExtensionClient {
    http: reqwest::Client,
    base_url: String,
    extension_id: String,
}

impl ExtensionClient {
    /// Register with the Extensions API at `runtime_api` (a `host:port`).
    ///
    /// Subscribes to `INVOKE` only. The extension lives inside the function
    /// process, and the platform refuses `SHUTDOWN` subscriptions from such
    /// internal extensions; process shutdown arrives as SIGTERM instead.
    pub async fn register(runtime_api: &str, name: &str) -> Result<Self, InvocationError> {
        let http = reqwest::Client::new();
        let base_url = format!("http://{runtime_api}/{EXTENSION_API_VERSION}/extension");

        let response = http
            .post(format!("{base_url}/register"))
            .header(HEADER_EXTENSION_NAME, name)
            .json(&json!({ "events": REGISTERED_EVENTS }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InvocationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let extension_id = response
            .headers()
            .get(HEADER_EXTENSION_IDENTIFIER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(InvocationError::MissingHeader(HEADER_EXTENSION_IDENTIFIER))?;

        info!(extension = %name, extension_id = %extension_id, "registered lambda extension");

        Ok(Self {
            http,
            base_url,
            extension_id,
        })
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }
}

#[async_trait]
impl InvocationSource for ExtensionClient {
    async fn next_invocation(&mut self) -> Result<InvocationEvent, InvocationError> {
        // No timeout: this call parks until the platform has something for us.
        let response = self
            .http
            .get(format!("{}/event/next", self.base_url))
            .header(HEADER_EXTENSION_IDENTIFIER, &self.extension_id)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(InvocationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let event: InvocationEvent = serde_json::from_str(&body)?;
        debug!(?event, "received extension event");
        Ok(event)
    }
}
