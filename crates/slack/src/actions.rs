use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::{
    blocks::{BlockBuilder, Dialog, DialogElement, DialogOption, PlainTextInput, View},
    commands::{OPEN_DIALOG_ACTION_ID, OPEN_MODAL_ACTION_ID},
    events::{
        EventHandler, EventHandlerError, HandlerContext, HandlerResult, SlackEnvelope, SlackEvent,
        Trigger,
    },
};

pub const DIAGNOSTIC_MODAL_CALLBACK_ID: &str = "diagnostic_modal";
pub const FEEDBACK_DIALOG_CALLBACK_ID: &str = "feedback_dialog";

// Section text is capped at 3000 characters by Slack.
const PAYLOAD_DUMP_MAX_CHARS: usize = 2_800;

pub struct OpenModalActionHandler;

#[async_trait]
impl EventHandler for OpenModalActionHandler {
    fn trigger(&self) -> Trigger {
        Trigger::Action { action_id: OPEN_MODAL_ACTION_ID.to_owned() }
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(action) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        ctx.ack().await?;
        info!(
            event_name = "handler.action.open_modal",
            correlation_id = %ctx.correlation_id,
            action_id = %action.action_id,
            user_id = %action.user_id,
            "opening diagnostic modal"
        );

        ctx.api.open_view(&action.trigger_id, &diagnostic_modal(&envelope.raw)).await?;
        Ok(HandlerResult::Processed)
    }
}

pub struct OpenDialogActionHandler;

#[async_trait]
impl EventHandler for OpenDialogActionHandler {
    fn trigger(&self) -> Trigger {
        Trigger::Action { action_id: OPEN_DIALOG_ACTION_ID.to_owned() }
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(action) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        ctx.ack().await?;
        info!(
            event_name = "handler.action.open_dialog",
            correlation_id = %ctx.correlation_id,
            action_id = %action.action_id,
            user_id = %action.user_id,
            "opening legacy dialog"
        );

        ctx.api.open_dialog(&action.trigger_id, &feedback_dialog(action.value.as_deref())).await?;
        Ok(HandlerResult::Processed)
    }
}

/// Acks modal submissions so Slack closes the modal.
pub struct ModalSubmissionHandler;

#[async_trait]
impl EventHandler for ModalSubmissionHandler {
    fn trigger(&self) -> Trigger {
        Trigger::ViewSubmission { callback_id: DIAGNOSTIC_MODAL_CALLBACK_ID.to_owned() }
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(submission) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        ctx.ack().await?;
        info!(
            event_name = "handler.view.submitted",
            correlation_id = %ctx.correlation_id,
            callback_id = %submission.callback_id,
            user_id = %submission.user_id,
            values = %submission.values,
            "modal submitted"
        );
        Ok(HandlerResult::Processed)
    }
}

pub struct DialogSubmissionHandler;

#[async_trait]
impl EventHandler for DialogSubmissionHandler {
    fn trigger(&self) -> Trigger {
        Trigger::DialogSubmission { callback_id: FEEDBACK_DIALOG_CALLBACK_ID.to_owned() }
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::DialogSubmission(submission) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        ctx.ack().await?;
        info!(
            event_name = "handler.dialog.submitted",
            correlation_id = %ctx.correlation_id,
            callback_id = %submission.callback_id,
            user_id = %submission.user_id,
            submission = %submission.submission,
            "dialog submitted"
        );
        Ok(HandlerResult::Processed)
    }
}

pub fn diagnostic_modal(body: &Value) -> View {
    View::modal(DIAGNOSTIC_MODAL_CALLBACK_ID, "Payload Inspector")
        .submit("Submit")
        .close("Cancel")
        .blocks(
            BlockBuilder::new()
                .section("modal.intro.v1", |section| {
                    section.mrkdwn("Welcome to a modal with _blocks_ :wave:");
                })
                .input(
                    "modal.name.v1",
                    "What should we call you?",
                    PlainTextInput::new("name_input").placeholder("Your name"),
                )
                .optional_input(
                    "modal.notes.v1",
                    "Anything else?",
                    PlainTextInput::new("notes_input").multiline(),
                )
                .divider("modal.divider.v1")
                .section("modal.payload.v1", |section| {
                    section.mrkdwn(format!(
                        "*Interaction payload*\n```{}```",
                        payload_dump(body)
                    ));
                }),
        )
}

fn payload_dump(body: &Value) -> String {
    let rendered = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
    if rendered.chars().count() <= PAYLOAD_DUMP_MAX_CHARS {
        return rendered;
    }

    let mut truncated: String = rendered.chars().take(PAYLOAD_DUMP_MAX_CHARS).collect();
    truncated.push_str("\n… (truncated)");
    truncated
}

pub fn feedback_dialog(state: Option<&str>) -> Dialog {
    Dialog {
        callback_id: FEEDBACK_DIALOG_CALLBACK_ID.to_owned(),
        title: "Request a Coffee".to_owned(),
        submit_label: "Request".to_owned(),
        notify_on_cancel: false,
        state: state.map(str::to_owned),
        elements: vec![
            DialogElement::Text {
                label: "Pickup Location".to_owned(),
                name: "loc_origin".to_owned(),
                placeholder: Some("Front desk".to_owned()),
                optional: false,
            },
            DialogElement::Textarea {
                label: "Special requests".to_owned(),
                name: "comment".to_owned(),
                hint: Some("Oat milk, extra shot, that kind of thing".to_owned()),
                optional: true,
            },
            DialogElement::Select {
                label: "Size".to_owned(),
                name: "size".to_owned(),
                options: vec![
                    DialogOption::new("Small", "small"),
                    DialogOption::new("Medium", "medium"),
                    DialogOption::new("Large", "large"),
                ],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        diagnostic_modal, feedback_dialog, payload_dump, DialogSubmissionHandler,
        ModalSubmissionHandler, OpenDialogActionHandler, OpenModalActionHandler,
        PAYLOAD_DUMP_MAX_CHARS,
    };
    use crate::blocks::{Block, TextObject};
    use crate::events::{
        DialogSubmissionEvent, EventHandler, HandlerResult, SlackEnvelope, SlackEvent,
        ViewSubmissionEvent,
    };
    use crate::testing::{action_envelope, Call, Recorder};

    #[tokio::test]
    async fn modal_action_acks_once_then_opens_view_with_trigger() {
        let recorder = Recorder::new();
        let envelope = action_envelope("button-action-modal-0", "U1", "trigger-42");

        let result =
            OpenModalActionHandler.handle(&envelope, &recorder.context()).await.expect("handle");

        assert_eq!(result, HandlerResult::Processed);
        let calls = recorder.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], Call::Ack);
        assert!(matches!(&calls[1], Call::OpenView { trigger_id, .. } if trigger_id == "trigger-42"));
    }

    #[tokio::test]
    async fn modal_embeds_the_serialized_interaction_body() {
        let recorder = Recorder::new();
        let envelope = action_envelope("button-action-modal-0", "U1", "trigger-42");
        let expected = serde_json::to_string_pretty(&envelope.raw).expect("serialize raw");

        OpenModalActionHandler.handle(&envelope, &recorder.context()).await.expect("handle");

        let calls = recorder.calls().await;
        let Some(Call::OpenView { view, .. }) = calls.last() else {
            panic!("expected a views.open call, got {calls:?}");
        };
        let embedded = view.blocks.iter().any(|block| {
            matches!(block, Block::Section { text: TextObject::Mrkdwn { text }, .. } if text.contains(&expected))
        });
        assert!(embedded, "modal should contain the pretty-printed payload");
    }

    #[tokio::test]
    async fn dialog_action_acks_once_then_opens_dialog() {
        let recorder = Recorder::new();
        let envelope = action_envelope("button-action-dialog-0", "U3", "trigger-7");

        OpenDialogActionHandler.handle(&envelope, &recorder.context()).await.expect("handle");

        let calls = recorder.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], Call::Ack);
        assert!(matches!(
            &calls[1],
            Call::OpenDialog { trigger_id, dialog } if trigger_id == "trigger-7" && dialog.state.as_deref() == Some("open_0")
        ));
    }

    #[tokio::test]
    async fn view_open_failure_propagates_after_ack() {
        let recorder = Recorder::failing(crate::api::VIEWS_OPEN);
        let envelope = action_envelope("button-action-modal-0", "U1", "trigger-1");

        let result = OpenModalActionHandler.handle(&envelope, &recorder.context()).await;

        assert!(result.is_err());
        assert_eq!(recorder.ack_count().await, 1);
    }

    #[tokio::test]
    async fn submissions_are_acknowledged_without_outbound_calls() {
        let recorder = Recorder::new();
        let view_submission = SlackEnvelope {
            envelope_id: "view-1".to_owned(),
            event: SlackEvent::ViewSubmission(ViewSubmissionEvent {
                user_id: "U1".to_owned(),
                callback_id: "diagnostic_modal".to_owned(),
                values: json!({ "modal.name.v1": { "name_input": { "value": "Ada" } } }),
            }),
            raw: json!({}),
        };
        let dialog_submission = SlackEnvelope {
            envelope_id: "dialog-1".to_owned(),
            event: SlackEvent::DialogSubmission(DialogSubmissionEvent {
                user_id: "U1".to_owned(),
                channel_id: Some("C1".to_owned()),
                callback_id: "feedback_dialog".to_owned(),
                submission: json!({ "loc_origin": "Lobby" }),
            }),
            raw: json!({}),
        };

        ModalSubmissionHandler.handle(&view_submission, &recorder.context()).await.expect("view");
        DialogSubmissionHandler
            .handle(&dialog_submission, &recorder.context())
            .await
            .expect("dialog");

        assert_eq!(recorder.calls().await, vec![Call::Ack, Call::Ack]);
    }

    #[test]
    fn oversized_payloads_are_truncated_for_section_limits() {
        let body = json!({ "blob": "x".repeat(PAYLOAD_DUMP_MAX_CHARS * 2) });
        let dump = payload_dump(&body);

        assert!(dump.ends_with("(truncated)"));
        assert!(dump.chars().count() < 3_000);
        assert!(diagnostic_modal(&body).blocks.len() >= 4);
    }

    #[test]
    fn feedback_dialog_title_fits_slack_limit() {
        let dialog = feedback_dialog(None);
        assert!(dialog.title.chars().count() <= 24);
        assert_eq!(dialog.elements.len(), 3);
        assert!(dialog.state.is_none());
    }
}
