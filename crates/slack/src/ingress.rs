//! Decoding of inbound Slack HTTP bodies.
//!
//! Slack posts three shapes to the same request URL: Events API callbacks as
//! JSON, slash commands as a form, and interactions as a form whose `payload`
//! field carries JSON. [`parse_request`] turns any of them into an [`Ingress`].

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    commands::SlashCommandPayload,
    events::{
        AppHomeOpenedEvent, BlockActionEvent, DialogSubmissionEvent, MessageEvent, SlackEnvelope,
        SlackEvent, ViewSubmissionEvent,
    },
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ingress {
    UrlVerification { challenge: String },
    SslCheck,
    Request(SlackEnvelope),
}

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("request body is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("request body is not valid utf-8")]
    InvalidEncoding,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unsupported content type `{0}`")]
    UnsupportedContentType(String),
}

pub fn parse_request(content_type: Option<&str>, body: &[u8]) -> Result<Ingress, IngressError> {
    match content_type.map(str::trim) {
        Some(value) if value.starts_with(FORM_CONTENT_TYPE) => parse_form(body),
        None => parse_json(body),
        Some(value) if value.starts_with("application/json") => parse_json(body),
        Some(other) => Err(IngressError::UnsupportedContentType(other.to_owned())),
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CallbackBody {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event_id: Option<String>,
        event: Value,
    },
    #[serde(other)]
    Other,
}

/// Only `message` and `app_home_opened` get a typed view; other event kinds
/// stay raw json.
#[derive(Deserialize)]
struct MessageFields {
    bot_id: Option<String>,
    user: Option<String>,
    channel: Option<String>,
    text: Option<String>,
    #[serde(default)]
    ts: String,
    thread_ts: Option<String>,
}

#[derive(Deserialize)]
struct AppHomeFields {
    user: Option<String>,
    tab: Option<String>,
}

fn parse_json(body: &[u8]) -> Result<Ingress, IngressError> {
    let raw: Value = serde_json::from_slice(body)?;

    match CallbackBody::deserialize(&raw)? {
        CallbackBody::UrlVerification { challenge } => Ok(Ingress::UrlVerification { challenge }),
        CallbackBody::EventCallback { event_id, event } => {
            let event = callback_event(&event)?;
            Ok(Ingress::Request(SlackEnvelope {
                envelope_id: event_id.unwrap_or_else(generated_id),
                event,
                raw,
            }))
        }
        CallbackBody::Other => {
            let event_type = raw.get("type").and_then(Value::as_str).unwrap_or("unknown").to_owned();
            Ok(Ingress::Request(SlackEnvelope {
                envelope_id: generated_id(),
                event: SlackEvent::Unsupported { event_type },
                raw,
            }))
        }
    }
}

fn callback_event(event: &Value) -> Result<SlackEvent, IngressError> {
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or("unknown");

    match event_type {
        "message" => {
            // Edits, joins and bot posts (including our own replies) never reach handlers.
            if let Some(subtype) = event.get("subtype").and_then(Value::as_str) {
                return Ok(SlackEvent::Unsupported { event_type: format!("message:{subtype}") });
            }
            let message = MessageFields::deserialize(event)?;
            let (Some(user_id), None) = (message.user, message.bot_id) else {
                return Ok(SlackEvent::Unsupported { event_type: "message:bot_message".to_owned() });
            };
            Ok(SlackEvent::Message(MessageEvent {
                channel_id: message.channel.ok_or(IngressError::MissingField("event.channel"))?,
                user_id,
                text: message.text.unwrap_or_default(),
                ts: message.ts,
                thread_ts: message.thread_ts,
            }))
        }
        "app_home_opened" => {
            let opened = AppHomeFields::deserialize(event)?;
            Ok(SlackEvent::AppHomeOpened(AppHomeOpenedEvent {
                user_id: opened.user.ok_or(IngressError::MissingField("event.user"))?,
                tab: opened.tab,
            }))
        }
        other => Ok(SlackEvent::Unsupported { event_type: other.to_owned() }),
    }
}

fn parse_form(body: &[u8]) -> Result<Ingress, IngressError> {
    std::str::from_utf8(body).map_err(|_| IngressError::InvalidEncoding)?;
    let mut fields: HashMap<String, String> =
        form_urlencoded::parse(body).map(|(key, value)| (key.into_owned(), value.into_owned())).collect();

    if let Some(payload) = fields.remove("payload") {
        return parse_interaction(&payload);
    }
    if fields.get("ssl_check").map(String::as_str) == Some("1") {
        return Ok(Ingress::SslCheck);
    }
    parse_slash_command(fields)
}

fn parse_slash_command(mut fields: HashMap<String, String>) -> Result<Ingress, IngressError> {
    let raw = Value::Object(
        fields.iter().map(|(key, value)| (key.clone(), Value::String(value.clone()))).collect::<Map<_, _>>(),
    );
    let mut take = |key: &'static str| fields.remove(key).ok_or(IngressError::MissingField(key));

    let payload = SlashCommandPayload {
        command: take("command")?,
        channel_id: take("channel_id")?,
        user_id: take("user_id")?,
        trigger_id: take("trigger_id")?,
        text: take("text").unwrap_or_default(),
        user_name: take("user_name").ok(),
        response_url: take("response_url").ok(),
    };

    Ok(Ingress::Request(SlackEnvelope {
        envelope_id: payload.trigger_id.clone(),
        event: SlackEvent::SlashCommand(payload),
        raw,
    }))
}

#[derive(Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type")]
    kind: String,
    trigger_id: Option<String>,
    user: Option<IdRef>,
    channel: Option<IdRef>,
    #[serde(default)]
    actions: Vec<ActionRef>,
    view: Option<ViewRef>,
    callback_id: Option<String>,
    #[serde(default)]
    submission: Value,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Deserialize)]
struct ActionRef {
    action_id: String,
    block_id: Option<String>,
    value: Option<String>,
}

#[derive(Deserialize)]
struct ViewRef {
    callback_id: Option<String>,
    #[serde(default)]
    state: ViewState,
}

#[derive(Default, Deserialize)]
struct ViewState {
    #[serde(default)]
    values: Value,
}

fn parse_interaction(payload: &str) -> Result<Ingress, IngressError> {
    let raw: Value = serde_json::from_str(payload)?;
    let interaction = InteractionPayload::deserialize(&raw)?;
    let envelope_id = interaction.trigger_id.clone().unwrap_or_else(generated_id);
    let user_id = || {
        interaction.user.as_ref().map(|user| user.id.clone()).ok_or(IngressError::MissingField("user.id"))
    };
    let channel_id = interaction.channel.as_ref().map(|channel| channel.id.clone());

    let event = match interaction.kind.as_str() {
        "block_actions" => {
            // Buttons are the only interactive elements posted here, one action per click.
            let action =
                interaction.actions.first().ok_or(IngressError::MissingField("actions"))?;
            SlackEvent::BlockAction(BlockActionEvent {
                user_id: user_id()?,
                channel_id,
                trigger_id: interaction
                    .trigger_id
                    .clone()
                    .ok_or(IngressError::MissingField("trigger_id"))?,
                action_id: action.action_id.clone(),
                block_id: action.block_id.clone(),
                value: action.value.clone(),
            })
        }
        "view_submission" => {
            let view = interaction.view.as_ref().ok_or(IngressError::MissingField("view"))?;
            SlackEvent::ViewSubmission(ViewSubmissionEvent {
                user_id: user_id()?,
                callback_id: view
                    .callback_id
                    .clone()
                    .ok_or(IngressError::MissingField("view.callback_id"))?,
                values: view.state.values.clone(),
            })
        }
        "dialog_submission" => SlackEvent::DialogSubmission(DialogSubmissionEvent {
            user_id: user_id()?,
            channel_id,
            callback_id: interaction
                .callback_id
                .clone()
                .ok_or(IngressError::MissingField("callback_id"))?,
            submission: interaction.submission.clone(),
        }),
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    };

    Ok(Ingress::Request(SlackEnvelope { envelope_id, event, raw }))
}

fn generated_id() -> String {
    Uuid::new_v4().to_string()
}
