use greetbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

use super::CommandResult;

pub const DOCTOR_FAILED_EXIT_CODE: u8 = 3;

// Slack signing secrets are 32 hex characters.
const EXPECTED_SIGNING_SECRET_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code =
        if report.overall_status == CheckStatus::Pass { 0 } else { DOCTOR_FAILED_EXIT_CODE };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_bot_token(&config));
            checks.push(check_signing_secret(&config));
            checks.push(check_listen_address(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["slack_bot_token", "slack_signing_secret", "listen_address"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_bot_token(config: &AppConfig) -> DoctorCheck {
    let token = config.slack.bot_token.expose_secret();
    let segments = token.split('-').count();
    if segments < 3 {
        return DoctorCheck {
            name: "slack_bot_token",
            status: CheckStatus::Fail,
            details: "bot token looks truncated (expected xoxb-<team>-<bot>-<secret>)".to_string(),
        };
    }

    DoctorCheck {
        name: "slack_bot_token",
        status: CheckStatus::Pass,
        details: "bot token has the xoxb- shape".to_string(),
    }
}

fn check_signing_secret(config: &AppConfig) -> DoctorCheck {
    let secret = config.slack.signing_secret.expose_secret().trim();
    if secret.len() != EXPECTED_SIGNING_SECRET_LEN
        || !secret.chars().all(|ch| ch.is_ascii_hexdigit())
    {
        return DoctorCheck {
            name: "slack_signing_secret",
            status: CheckStatus::Fail,
            details: format!(
                "signing secret should be {EXPECTED_SIGNING_SECRET_LEN} hex characters, found {}",
                secret.len()
            ),
        };
    }

    DoctorCheck {
        name: "slack_signing_secret",
        status: CheckStatus::Pass,
        details: "signing secret has the expected shape".to_string(),
    }
}

fn check_listen_address(config: &AppConfig) -> DoctorCheck {
    let address = config.listen_address();
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "listen_address",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|error| format!("cannot bind `{address}`: {error}"))?;
        drop(listener);
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "listen_address",
            status: CheckStatus::Pass,
            details: format!("`{address}` is available"),
        },
        Err(error) => DoctorCheck { name: "listen_address", status: CheckStatus::Fail, details: error },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
