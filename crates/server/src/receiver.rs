use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use greetbot_core::errors::{ApplicationError, InterfaceError};
use greetbot_slack::{
    ack::{Acknowledge, NoopAck, ResponseAck},
    api::SlackApi,
    events::{EventDispatcher, HandlerContext, HandlerResult, SlackEnvelope},
    ingress::{parse_request, Ingress},
    signature::{RequestVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER},
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const EVENTS_PATH: &str = "/slack/events";

#[derive(Clone)]
pub struct ReceiverState {
    pub dispatcher: Arc<EventDispatcher>,
    pub api: Arc<dyn SlackApi>,
    pub verifier: Arc<RequestVerifier>,
    pub ack_timeout: Duration,
    pub process_before_response: bool,
}

pub fn router(state: ReceiverState) -> Router {
    Router::new()
        .route(EVENTS_PATH, post(receive))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    correlation_id: String,
}

/// HTTP rendering of an [`InterfaceError`].
#[derive(Debug)]
pub struct ReceiverError(pub InterfaceError);

impl IntoResponse for ReceiverError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<InterfaceError> for ReceiverError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

pub async fn receive(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ReceiverError> {
    let request_id = Uuid::new_v4().to_string();
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    if let Err(error) =
        state.verifier.verify(header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), &body, Utc::now())
    {
        warn!(
            event_name = "receiver.signature.rejected",
            correlation_id = %request_id,
            error = %error,
            "rejecting request with invalid signature"
        );
        return Err(InterfaceError::Unauthorized {
            message: error.to_string(),
            correlation_id: request_id,
        }
        .into());
    }

    let ingress = parse_request(header(CONTENT_TYPE.as_str()), &body).map_err(|error| {
        warn!(
            event_name = "receiver.body.rejected",
            correlation_id = %request_id,
            error = %error,
            "rejecting unparseable request body"
        );
        InterfaceError::BadRequest { message: error.to_string(), correlation_id: request_id.clone() }
    })?;

    match ingress {
        Ingress::UrlVerification { challenge } => {
            info!(
                event_name = "receiver.url_verification",
                correlation_id = %request_id,
                "answering url verification challenge"
            );
            Ok(Json(json!({ "challenge": challenge })).into_response())
        }
        Ingress::SslCheck => Ok(StatusCode::OK.into_response()),
        Ingress::Request(envelope) if envelope.event.requires_ack() => {
            receive_acked(state, envelope).await
        }
        Ingress::Request(envelope) => {
            receive_event(state, envelope).await;
            Ok(StatusCode::OK.into_response())
        }
    }
}

/// Events API callbacks: Slack only needs a 200, handlers run after it.
async fn receive_event(state: ReceiverState, envelope: SlackEnvelope) {
    let ctx = HandlerContext::new(
        envelope.envelope_id.clone(),
        Arc::clone(&state.api),
        Arc::new(NoopAck) as Arc<dyn Acknowledge>,
    );

    if state.process_before_response {
        run_dispatch(state.dispatcher, envelope, ctx).await;
    } else {
        tokio::spawn(run_dispatch(state.dispatcher, envelope, ctx));
    }
}

/// Commands and interactions: the response is held until the handler acks.
async fn receive_acked(
    state: ReceiverState,
    envelope: SlackEnvelope,
) -> Result<Response, ReceiverError> {
    let correlation_id = envelope.envelope_id.clone();
    if !state.dispatcher.has_listener(&envelope.event) {
        warn!(
            event_name = "receiver.listener.missing",
            correlation_id = %correlation_id,
            event_type = ?envelope.event.event_type(),
            "no listener registered for request"
        );
        return Err(InterfaceError::NotFound {
            message: format!("no listener for {:?}", envelope.event.event_type()),
            correlation_id,
        }
        .into());
    }

    let (acknowledger, acked) = ResponseAck::channel();
    let ctx = HandlerContext::new(
        correlation_id.clone(),
        Arc::clone(&state.api),
        Arc::new(acknowledger) as Arc<dyn Acknowledge>,
    );
    let task = tokio::spawn(run_dispatch(state.dispatcher, envelope, ctx));

    if state.process_before_response {
        let mut acked = acked;
        let Err(join_error) = task.await else {
            return Ok(finished_response(acked, &correlation_id));
        };
        error!(
            event_name = "receiver.dispatch.panicked",
            correlation_id = %correlation_id,
            error = %join_error,
            "handler task did not complete"
        );
        if acked.try_recv().is_ok() {
            return Ok(StatusCode::OK.into_response());
        }
        return Err(ApplicationError::Handler(format!("handler task failed: {join_error}"))
            .into_interface(correlation_id)
            .into());
    }

    match tokio::time::timeout(state.ack_timeout, acked).await {
        Ok(Ok(())) => Ok(StatusCode::OK.into_response()),
        Ok(Err(_)) => {
            warn!(
                event_name = "receiver.ack.missing",
                correlation_id = %correlation_id,
                "handler finished without acknowledging"
            );
            Ok(StatusCode::OK.into_response())
        }
        Err(_) => {
            warn!(
                event_name = "receiver.ack.timeout",
                correlation_id = %correlation_id,
                timeout_ms = state.ack_timeout.as_millis() as u64,
                "handler did not acknowledge in time"
            );
            Err(ApplicationError::Integration("acknowledgement window elapsed".to_owned())
                .into_interface(correlation_id)
                .into())
        }
    }
}

fn finished_response(mut acked: oneshot::Receiver<()>, correlation_id: &str) -> Response {
    if acked.try_recv().is_err() {
        warn!(
            event_name = "receiver.ack.missing",
            correlation_id = %correlation_id,
            "handler finished without acknowledging"
        );
    }
    StatusCode::OK.into_response()
}

async fn run_dispatch(
    dispatcher: Arc<EventDispatcher>,
    envelope: SlackEnvelope,
    ctx: HandlerContext,
) {
    match dispatcher.dispatch(&envelope, &ctx).await {
        Ok(HandlerResult::Processed) => debug!(
            event_name = "receiver.dispatch.processed",
            correlation_id = %ctx.correlation_id,
            event_type = ?envelope.event.event_type(),
            "request handled"
        ),
        Ok(HandlerResult::Ignored) => debug!(
            event_name = "receiver.dispatch.ignored",
            correlation_id = %ctx.correlation_id,
            event_type = ?envelope.event.event_type(),
            "no listener matched"
        ),
        Err(error) => warn!(
            event_name = "receiver.dispatch.failed",
            correlation_id = %ctx.correlation_id,
            event_type = ?envelope.event.event_type(),
            error = %error,
            "listener failed"
        ),
    }
}
