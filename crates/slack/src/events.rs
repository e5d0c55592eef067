use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::{
    ack::{AckError, Acknowledge},
    actions::{
        DialogSubmissionHandler, ModalSubmissionHandler, OpenDialogActionHandler,
        OpenModalActionHandler,
    },
    api::{ApiError, SlackApi},
    blocks::MessageTemplate,
    commands::{SlashCommandPayload, StartCommandHandler},
    home::AppHomeHandler,
    messages::HelloMessageHandler,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
    /// Body as Slack delivered it: the event callback JSON or the decoded
    /// interaction payload, or the slash command form as an object.
    pub raw: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    ViewSubmission(ViewSubmissionEvent),
    DialogSubmission(DialogSubmissionEvent),
    AppHomeOpened(AppHomeOpenedEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::DialogSubmission(_) => SlackEventType::DialogSubmission,
            Self::AppHomeOpened(_) => SlackEventType::AppHomeOpened,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Commands and interactions need an explicit ack from their handler;
    /// Events API callbacks are acknowledged by the receiver.
    pub fn requires_ack(&self) -> bool {
        matches!(
            self,
            Self::SlashCommand(_)
                | Self::BlockAction(_)
                | Self::ViewSubmission(_)
                | Self::DialogSubmission(_)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    SlashCommand,
    BlockAction,
    ViewSubmission,
    DialogSubmission,
    AppHomeOpened,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub user_id: String,
    pub channel_id: Option<String>,
    pub trigger_id: String,
    pub action_id: String,
    pub block_id: Option<String>,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub user_id: String,
    pub callback_id: String,
    pub values: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogSubmissionEvent {
    pub user_id: String,
    pub channel_id: Option<String>,
    pub callback_id: String,
    pub submission: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppHomeOpenedEvent {
    pub user_id: String,
    pub tab: Option<String>,
}

/// Key a handler is registered under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Message text contains the substring (case-sensitive).
    Message { contains: String },
    Command { name: String },
    Action { action_id: String },
    ViewSubmission { callback_id: String },
    DialogSubmission { callback_id: String },
    /// Events API event type, e.g. `app_home_opened`.
    Event { event_type: String },
}

impl Trigger {
    pub fn matches(&self, event: &SlackEvent) -> bool {
        match (self, event) {
            (Self::Message { contains }, SlackEvent::Message(message)) => {
                message.text.contains(contains.as_str())
            }
            (Self::Command { name }, SlackEvent::SlashCommand(payload)) => payload.command == *name,
            (Self::Action { action_id }, SlackEvent::BlockAction(action)) => {
                action.action_id == *action_id
            }
            (Self::ViewSubmission { callback_id }, SlackEvent::ViewSubmission(submission)) => {
                submission.callback_id == *callback_id
            }
            (Self::DialogSubmission { callback_id }, SlackEvent::DialogSubmission(submission)) => {
                submission.callback_id == *callback_id
            }
            (Self::Event { event_type }, SlackEvent::AppHomeOpened(_)) => {
                event_type == "app_home_opened"
            }
            (Self::Event { event_type }, SlackEvent::Message(_)) => event_type == "message",
            (Self::Event { event_type: wanted }, SlackEvent::Unsupported { event_type }) => {
                wanted == event_type
            }
            _ => false,
        }
    }
}

/// What a handler gets besides the envelope: outbound API, ack, correlation.
#[derive(Clone)]
pub struct HandlerContext {
    pub correlation_id: String,
    pub api: Arc<dyn SlackApi>,
    pub acknowledger: Arc<dyn Acknowledge>,
}

impl HandlerContext {
    pub fn new(
        correlation_id: impl Into<String>,
        api: Arc<dyn SlackApi>,
        acknowledger: Arc<dyn Acknowledge>,
    ) -> Self {
        Self { correlation_id: correlation_id.into(), api, acknowledger }
    }

    /// A late ack (window already closed) is logged and the handler keeps going.
    pub async fn ack(&self) -> Result<(), EventHandlerError> {
        match self.acknowledger.ack().await {
            Ok(()) => Ok(()),
            Err(AckError::WindowClosed) => {
                warn!(
                    event_name = "slack.ack.late",
                    correlation_id = %self.correlation_id,
                    "acknowledgement window already closed, continuing"
                );
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    pub async fn say(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), EventHandlerError> {
        self.api.post_message(channel_id, message).await.map_err(EventHandlerError::from)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Ack(#[from] AckError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{} listener(s) failed: {}", .0.len(), join_errors(.0))]
    Handlers(Vec<EventHandlerError>),
}

fn join_errors(errors: &[EventHandlerError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn trigger(&self) -> Trigger;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Callback registry. Every handler whose trigger matches runs in
/// registration order and failures are collected.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<(Trigger, Arc<dyn EventHandler>)>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.push((handler.trigger(), Arc::new(handler)));
    }

    pub fn has_listener(&self, event: &SlackEvent) -> bool {
        self.handlers.iter().any(|(trigger, _)| trigger.matches(event))
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, DispatchError> {
        let mut matched = false;
        let mut failures = Vec::new();

        for (_, handler) in self.handlers.iter().filter(|(trigger, _)| trigger.matches(&envelope.event))
        {
            matched = true;
            if let Err(error) = handler.handle(envelope, ctx).await {
                failures.push(error);
            }
        }

        if !failures.is_empty() {
            return Err(DispatchError::Handlers(failures));
        }

        Ok(if matched { HandlerResult::Processed } else { HandlerResult::Ignored })
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppSettings {
    pub announce_channel: Option<String>,
}

pub fn app_dispatcher(settings: AppSettings) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(HelloMessageHandler);
    dispatcher.register(StartCommandHandler::new(settings.announce_channel));
    dispatcher.register(OpenModalActionHandler);
    dispatcher.register(OpenDialogActionHandler);
    dispatcher.register(ModalSubmissionHandler);
    dispatcher.register(DialogSubmissionHandler);
    dispatcher.register(AppHomeHandler);
    dispatcher
}
