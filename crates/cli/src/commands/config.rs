use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use greetbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::CommandResult;

pub const CONFIG_INVALID_EXIT_CODE: u8 = 2;

struct ConfigField {
    key_path: &'static str,
    value: String,
    /// Checked in order; the first one set wins, matching the loader.
    env_keys: &'static [&'static str],
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                CONFIG_INVALID_EXIT_CODE,
            )
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    vec![
        ConfigField {
            key_path: "slack.bot_token",
            value: redact_token(config.slack.bot_token.expose_secret()),
            env_keys: &["GREETBOT_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"],
        },
        ConfigField {
            key_path: "slack.signing_secret",
            value: redact_secret(config.slack.signing_secret.expose_secret()),
            env_keys: &["GREETBOT_SLACK_SIGNING_SECRET", "SLACK_SIGNING_SECRET"],
        },
        ConfigField {
            key_path: "slack.api_base_url",
            value: config.slack.api_base_url.clone(),
            env_keys: &["GREETBOT_SLACK_API_BASE_URL"],
        },
        ConfigField {
            key_path: "slack.announce_channel",
            value: config
                .slack
                .announce_channel
                .clone()
                .unwrap_or_else(|| "<invoking channel>".to_string()),
            env_keys: &["GREETBOT_SLACK_ANNOUNCE_CHANNEL"],
        },
        ConfigField {
            key_path: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["GREETBOT_SERVER_BIND_ADDRESS"],
        },
        ConfigField {
            key_path: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["GREETBOT_SERVER_PORT", "PORT"],
        },
        ConfigField {
            key_path: "server.ack_timeout_ms",
            value: config.server.ack_timeout_ms.to_string(),
            env_keys: &["GREETBOT_SERVER_ACK_TIMEOUT_MS"],
        },
        ConfigField {
            key_path: "server.process_before_response",
            value: config.server.process_before_response.to_string(),
            env_keys: &["GREETBOT_SERVER_PROCESS_BEFORE_RESPONSE"],
        },
        ConfigField {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["GREETBOT_LOGGING_LEVEL", "GREETBOT_LOG_LEVEL"],
        },
        ConfigField {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["GREETBOT_LOGGING_FORMAT", "GREETBOT_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("greetbot.toml"), PathBuf::from("config/greetbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
