use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AckError {
    #[error("request was already acknowledged")]
    AlreadyAcknowledged,
    #[error("acknowledgement window closed before ack was sent")]
    WindowClosed,
}

/// Confirms receipt of a command or interaction to Slack.
///
/// Slack expects an acknowledgement within three seconds; anything a
/// handler does after acking happens out of band.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), AckError>;
}

/// Releases the pending HTTP response when the handler acks.
pub struct ResponseAck {
    sender: Mutex<Option<oneshot::Sender<()>>>,
}

impl ResponseAck {
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender: Mutex::new(Some(sender)) }, receiver)
    }
}

#[async_trait]
impl Acknowledge for ResponseAck {
    async fn ack(&self) -> Result<(), AckError> {
        let sender = self.sender.lock().await.take().ok_or(AckError::AlreadyAcknowledged)?;
        sender.send(()).map_err(|_| AckError::WindowClosed)
    }
}

/// Used for Events API callbacks, which the receiver acknowledges before
/// any handler runs.
#[derive(Default)]
pub struct NoopAck;

#[async_trait]
impl Acknowledge for NoopAck {
    async fn ack(&self) -> Result<(), AckError> {
        Ok(())
    }
}
