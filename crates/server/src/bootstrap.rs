use std::{sync::Arc, time::Duration};

use axum::Router;
use greetbot_core::config::{AppConfig, ConfigError};
use greetbot_slack::{
    api::{ApiError, SlackApi, SlackWebClient},
    events::{app_dispatcher, AppSettings, EventDispatcher},
    signature::RequestVerifier,
};
use thiserror::Error;
use tracing::info;

use crate::{health, receiver};

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Arc<EventDispatcher>,
    pub api: Arc<dyn SlackApi>,
    pub verifier: Arc<RequestVerifier>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack web client could not be built: {0}")]
    SlackClient(#[source] ApiError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let api = SlackWebClient::new(config.slack.api_base_url.clone(), config.slack.bot_token.clone())
        .map_err(BootstrapError::SlackClient)?;
    let dispatcher = app_dispatcher(AppSettings {
        announce_channel: config.slack.announce_channel.clone(),
    });
    info!(
        event_name = "system.bootstrap.handlers_registered",
        correlation_id = "bootstrap",
        handler_count = dispatcher.handler_count(),
        api_base_url = %config.slack.api_base_url,
        "slack listeners registered"
    );

    Ok(Application {
        verifier: Arc::new(RequestVerifier::new(config.slack.signing_secret.clone())),
        dispatcher: Arc::new(dispatcher),
        api: Arc::new(api),
        config,
    })
}

impl Application {
    pub fn receiver_state(&self) -> receiver::ReceiverState {
        receiver::ReceiverState {
            dispatcher: Arc::clone(&self.dispatcher),
            api: Arc::clone(&self.api),
            verifier: Arc::clone(&self.verifier),
            ack_timeout: Duration::from_millis(self.config.server.ack_timeout_ms),
            process_before_response: self.config.server.process_before_response,
        }
    }

    /// Slack request URL plus the health check.
    pub fn router(&self) -> Router {
        receiver::router(self.receiver_state()).merge(health::router(health::HealthState::new(
            self.dispatcher.handler_count(),
            self.config.slack.api_base_url.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use greetbot_core::config::AppConfig;

    use super::{bootstrap_with_config, BootstrapError};

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.slack.bot_token = "xoxb-test".to_owned().into();
        config.slack.signing_secret = "signing-secret".to_owned().into();
        config
    }

    #[test]
    fn bootstrap_fails_fast_on_user_token() {
        let mut config = valid_config();
        config.slack.bot_token = "xoxp-user".to_owned().into();

        let error = bootstrap_with_config(config).err().expect("error");

        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("slack.bot_token"));
    }

    #[test]
    fn bootstrap_registers_listeners_and_carries_ack_settings() {
        let mut config = valid_config();
        config.server.ack_timeout_ms = 1_500;
        config.server.process_before_response = true;

        let app = bootstrap_with_config(config).expect("bootstrap");
        let state = app.receiver_state();

        assert_eq!(app.dispatcher.handler_count(), 7);
        assert_eq!(state.ack_timeout.as_millis(), 1_500);
        assert!(state.process_before_response);
    }
}
