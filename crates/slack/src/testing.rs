//! Recording fakes shared by the handler tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::{
    ack::{AckError, Acknowledge},
    api::{ApiError, SlackApi, DIALOG_OPEN, POST_MESSAGE, VIEWS_OPEN, VIEWS_PUBLISH},
    blocks::{Dialog, MessageTemplate, View},
    commands::SlashCommandPayload,
    events::{
        AppHomeOpenedEvent, BlockActionEvent, HandlerContext, MessageEvent, SlackEnvelope,
        SlackEvent,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Ack,
    PostMessage { channel: String, message: MessageTemplate },
    OpenView { trigger_id: String, view: View },
    OpenDialog { trigger_id: String, dialog: Dialog },
    PublishView { user_id: String, view: View },
}

/// Fake Web API client and acknowledger writing into one ordered call log.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    failing_method: Option<&'static str>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(method: &'static str) -> Self {
        Self { calls: Arc::default(), failing_method: Some(method) }
    }

    pub fn context(&self) -> HandlerContext {
        HandlerContext::new("test-correlation", Arc::new(self.clone()), Arc::new(self.clone()))
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn ack_count(&self) -> usize {
        self.calls.lock().await.iter().filter(|call| matches!(call, Call::Ack)).count()
    }

    pub async fn post_count(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| matches!(call, Call::PostMessage { .. }))
            .count()
    }

    async fn record(&self, method: &'static str, call: Call) -> Result<(), ApiError> {
        self.calls.lock().await.push(call);
        if self.failing_method == Some(method) {
            return Err(ApiError::Platform { method, error: "not_allowed_token_type".to_owned() });
        }
        Ok(())
    }
}

#[async_trait]
impl SlackApi for Recorder {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), ApiError> {
        self.record(
            POST_MESSAGE,
            Call::PostMessage { channel: channel.to_owned(), message: message.clone() },
        )
        .await
    }

    async fn open_view(&self, trigger_id: &str, view: &View) -> Result<(), ApiError> {
        self.record(VIEWS_OPEN, Call::OpenView { trigger_id: trigger_id.to_owned(), view: view.clone() })
            .await
    }

    async fn open_dialog(&self, trigger_id: &str, dialog: &Dialog) -> Result<(), ApiError> {
        self.record(
            DIALOG_OPEN,
            Call::OpenDialog { trigger_id: trigger_id.to_owned(), dialog: dialog.clone() },
        )
        .await
    }

    async fn publish_view(&self, user_id: &str, view: &View) -> Result<(), ApiError> {
        self.record(
            VIEWS_PUBLISH,
            Call::PublishView { user_id: user_id.to_owned(), view: view.clone() },
        )
        .await
    }
}

#[async_trait]
impl Acknowledge for Recorder {
    async fn ack(&self) -> Result<(), AckError> {
        self.calls.lock().await.push(Call::Ack);
        Ok(())
    }
}

pub fn message_envelope(text: &str, user_id: &str, channel_id: &str) -> SlackEnvelope {
    SlackEnvelope {
        envelope_id: "Ev-message".to_owned(),
        event: SlackEvent::Message(MessageEvent {
            channel_id: channel_id.to_owned(),
            user_id: user_id.to_owned(),
            text: text.to_owned(),
            ts: "1730000000.0001".to_owned(),
            thread_ts: None,
        }),
        raw: json!({ "type": "message", "text": text, "user": user_id, "channel": channel_id }),
    }
}

pub fn command_envelope(command: &str, user_id: &str, channel_id: &str) -> SlackEnvelope {
    SlackEnvelope {
        envelope_id: "cmd-trigger-1".to_owned(),
        event: SlackEvent::SlashCommand(SlashCommandPayload {
            command: command.to_owned(),
            text: String::new(),
            channel_id: channel_id.to_owned(),
            user_id: user_id.to_owned(),
            user_name: Some("ada".to_owned()),
            trigger_id: "trigger-1".to_owned(),
            response_url: None,
        }),
        raw: json!({ "command": command, "user_id": user_id, "channel_id": channel_id }),
    }
}

pub fn action_envelope(action_id: &str, user_id: &str, trigger_id: &str) -> SlackEnvelope {
    let raw = json!({
        "type": "block_actions",
        "trigger_id": trigger_id,
        "user": { "id": user_id },
        "channel": { "id": "C1" },
        "actions": [{ "action_id": action_id, "block_id": "start.v1", "value": "open_0" }]
    });
    SlackEnvelope {
        envelope_id: trigger_id.to_owned(),
        event: SlackEvent::BlockAction(BlockActionEvent {
            user_id: user_id.to_owned(),
            channel_id: Some("C1".to_owned()),
            trigger_id: trigger_id.to_owned(),
            action_id: action_id.to_owned(),
            block_id: Some("start.v1".to_owned()),
            value: Some("open_0".to_owned()),
        }),
        raw,
    }
}

pub fn home_envelope(user_id: &str) -> SlackEnvelope {
    SlackEnvelope {
        envelope_id: "Ev-home".to_owned(),
        event: SlackEvent::AppHomeOpened(AppHomeOpenedEvent {
            user_id: user_id.to_owned(),
            tab: Some("home".to_owned()),
        }),
        raw: json!({ "type": "app_home_opened", "user": user_id, "tab": "home" }),
    }
}
