use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::blocks::{Dialog, MessageTemplate, View};

pub const POST_MESSAGE: &str = "chat.postMessage";
pub const VIEWS_OPEN: &str = "views.open";
pub const VIEWS_PUBLISH: &str = "views.publish";
pub const DIALOG_OPEN: &str = "dialog.open";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("slack api `{method}` transport failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack api `{method}` returned http status {status}")]
    Status { method: &'static str, status: u16 },
    #[error("slack api `{method}` failed: {error}")]
    Platform { method: &'static str, error: String },
    #[error("slack api `{method}` returned an undecodable body: {detail}")]
    Decode { method: &'static str, detail: String },
}

impl ApiError {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Transport { method, .. }
            | Self::Status { method, .. }
            | Self::Platform { method, .. }
            | Self::Decode { method, .. } => method,
        }
    }
}

/// Outbound Slack Web API surface used by the handlers.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(&self, channel: &str, message: &MessageTemplate)
        -> Result<(), ApiError>;
    async fn open_view(&self, trigger_id: &str, view: &View) -> Result<(), ApiError>;
    async fn open_dialog(&self, trigger_id: &str, dialog: &Dialog) -> Result<(), ApiError>;
    async fn publish_view(&self, user_id: &str, view: &View) -> Result<(), ApiError>;
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a MessageTemplate,
}

#[derive(Debug, Serialize)]
struct OpenViewRequest<'a> {
    trigger_id: &'a str,
    view: &'a View,
}

#[derive(Debug, Serialize)]
struct PublishViewRequest<'a> {
    user_id: &'a str,
    view: &'a View,
}

#[derive(Debug, Serialize)]
struct OpenDialogRequest<'a> {
    trigger_id: &'a str,
    dialog: &'a Dialog,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackWebClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(base_url: impl Into<String>, bot_token: SecretString) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|source| ApiError::Transport { method: "client.build", source })?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_owned(), bot_token })
    }

    async fn call<T>(&self, method: &'static str, body: &T) -> Result<(), ApiError>
    where
        T: Serialize + Sync,
    {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport { method, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { method, status: status.as_u16() });
        }

        let raw = response.text().await.map_err(|source| ApiError::Transport { method, source })?;
        check_response(method, &raw)?;
        debug!(event_name = "egress.slack.api_ok", method, "slack api call succeeded");
        Ok(())
    }
}

fn check_response(method: &'static str, raw: &str) -> Result<(), ApiError> {
    let parsed: ApiResponse = serde_json::from_str(raw)
        .map_err(|error| ApiError::Decode { method, detail: error.to_string() })?;
    if parsed.ok {
        return Ok(());
    }
    Err(ApiError::Platform { method, error: parsed.error.unwrap_or_else(|| "unknown".to_owned()) })
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), ApiError> {
        self.call(POST_MESSAGE, &PostMessageRequest { channel, message }).await
    }

    async fn open_view(&self, trigger_id: &str, view: &View) -> Result<(), ApiError> {
        self.call(VIEWS_OPEN, &OpenViewRequest { trigger_id, view }).await
    }

    async fn open_dialog(&self, trigger_id: &str, dialog: &Dialog) -> Result<(), ApiError> {
        self.call(DIALOG_OPEN, &OpenDialogRequest { trigger_id, dialog }).await
    }

    async fn publish_view(&self, user_id: &str, view: &View) -> Result<(), ApiError> {
        self.call(VIEWS_PUBLISH, &PublishViewRequest { user_id, view }).await
    }
}
