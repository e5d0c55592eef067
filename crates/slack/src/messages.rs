use async_trait::async_trait;
use tracing::info;

use crate::{
    blocks::{MessageBuilder, MessageTemplate},
    events::{
        EventHandler, EventHandlerError, HandlerContext, HandlerResult, SlackEnvelope, SlackEvent,
        Trigger,
    },
};

pub const GREETING_TRIGGER: &str = "hello";

/// Replies to any message containing `hello`, mentioning the sender.
pub struct HelloMessageHandler;

#[async_trait]
impl EventHandler for HelloMessageHandler {
    fn trigger(&self) -> Trigger {
        Trigger::Message { contains: GREETING_TRIGGER.to_owned() }
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(message) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        info!(
            event_name = "handler.message.greeting",
            correlation_id = %ctx.correlation_id,
            user_id = %message.user_id,
            channel_id = %message.channel_id,
            "replying to greeting"
        );
        ctx.say(&message.channel_id, &greeting_message(&message.user_id)).await?;
        Ok(HandlerResult::Processed)
    }
}

pub fn greeting_message(user_id: &str) -> MessageTemplate {
    let text = format!("Hey there <@{user_id}>!");
    MessageBuilder::new(text.clone())
        .section("greeting.reply.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}
