use async_trait::async_trait;
use tracing::info;

use crate::{
    blocks::{ButtonElement, MessageBuilder, MessageTemplate},
    events::{
        EventHandler, EventHandlerError, HandlerContext, HandlerResult, SlackEnvelope, SlackEvent,
        Trigger,
    },
};

pub const START_COMMAND: &str = "/start";
pub const OPEN_MODAL_ACTION_ID: &str = "button-action-modal-0";
pub const OPEN_DIALOG_ACTION_ID: &str = "button-action-dialog-0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub trigger_id: String,
    pub response_url: Option<String>,
}

/// `/start`: acks, then posts the modal/dialog launcher.
pub struct StartCommandHandler {
    announce_channel: Option<String>,
}

impl StartCommandHandler {
    pub fn new(announce_channel: Option<String>) -> Self {
        Self { announce_channel }
    }

    fn target_channel<'a>(&'a self, payload: &'a SlashCommandPayload) -> &'a str {
        self.announce_channel.as_deref().unwrap_or(payload.channel_id.as_str())
    }
}

#[async_trait]
impl EventHandler for StartCommandHandler {
    fn trigger(&self) -> Trigger {
        Trigger::Command { name: START_COMMAND.to_owned() }
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        ctx.ack().await?;
        info!(
            event_name = "handler.command.received",
            correlation_id = %ctx.correlation_id,
            command = %payload.command,
            text = %payload.text,
            user_id = %payload.user_id,
            channel_id = %payload.channel_id,
            "slash command acknowledged"
        );

        ctx.say(self.target_channel(payload), &start_prompt_message()).await?;
        Ok(HandlerResult::Processed)
    }
}

pub fn start_prompt_message() -> MessageTemplate {
    MessageBuilder::new("Click the buttons to open a modal or dialog!")
        .section("start.modal.v1", |section| {
            section.mrkdwn("Click the button to open a Modal!").button(
                ButtonElement::new(OPEN_MODAL_ACTION_ID, "Open Modal").value("open_modal_0"),
            );
        })
        .section("start.dialog.v1", |section| {
            section.mrkdwn("Click the button to open a Dialog").button(
                ButtonElement::new(OPEN_DIALOG_ACTION_ID, "Open Dialog").value("open_dialog_0"),
            );
        })
        .build()
}
