use async_trait::async_trait;
use tracing::{error, info};

use crate::{
    blocks::{BlockBuilder, View},
    events::{
        EventHandler, EventHandlerError, HandlerContext, HandlerResult, SlackEnvelope, SlackEvent,
        Trigger,
    },
};

pub const APP_HOME_OPENED: &str = "app_home_opened";

/// Publishes the static home tab. A failed publish is logged and swallowed.
pub struct AppHomeHandler;

#[async_trait]
impl EventHandler for AppHomeHandler {
    fn trigger(&self) -> Trigger {
        Trigger::Event { event_type: APP_HOME_OPENED.to_owned() }
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppHomeOpened(opened) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        match ctx.api.publish_view(&opened.user_id, &home_view(&opened.user_id)).await {
            Ok(()) => info!(
                event_name = "handler.home.published",
                correlation_id = %ctx.correlation_id,
                user_id = %opened.user_id,
                "home view published"
            ),
            Err(publish_error) => error!(
                event_name = "handler.home.publish_failed",
                correlation_id = %ctx.correlation_id,
                user_id = %opened.user_id,
                method = publish_error.method(),
                error = %publish_error,
                "failed to publish home view"
            ),
        }

        Ok(HandlerResult::Processed)
    }
}

pub fn home_view(user_id: &str) -> View {
    View::home().blocks(
        BlockBuilder::new()
            .section("home.welcome.v1", |section| {
                section.mrkdwn(format!("*Welcome home, <@{user_id}> :house:*"));
            })
            .section("home.about.v1", |section| {
                section.mrkdwn(
                    "Type `/start` in any channel to try a modal and a dialog, or say \
                     `hello` and I'll say hi back.",
                );
            }),
    )
}
