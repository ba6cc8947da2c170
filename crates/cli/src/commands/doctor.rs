use quotebot_core::config::{AppConfig, LoadOptions};
use quotebot_core::directory::StaticDirectory;
use quotebot_core::host::{ChannelDirectory, IdentityDirectory};
use quotebot_db::{connect_storage, migrations};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
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
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
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
            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    let (directory, storage) = runtime.block_on(async {
                        (check_directory(&config).await, check_storage(&config).await)
                    });
                    checks.push(directory);
                    checks.push(storage);
                }
                Err(error) => {
                    let details = format!("failed to initialize async runtime: {error}");
                    checks.push(DoctorCheck {
                        name: "directory_readiness",
                        status: CheckStatus::Fail,
                        details: details.clone(),
                    });
                    checks.push(DoctorCheck {
                        name: "storage_readiness",
                        status: CheckStatus::Fail,
                        details,
                    });
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("directory_readiness"));
            checks.push(skipped("storage_readiness"));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_string(),
    }
}

/// An unresolvable channel or post user is only a warning: the bot still answers
/// commands, it just cannot post on activity.
async fn check_directory(config: &AppConfig) -> DoctorCheck {
    let directory = StaticDirectory::from_config(&config.directory);
    let plugin = &config.plugin;
    let mut problems = Vec::new();

    if plugin.team_id.trim().is_empty() {
        problems.push("plugin.team_id is not set".to_string());
    } else if directory.channel_by_name(&plugin.team_id, &plugin.post_channel).await.is_err() {
        problems.push(format!(
            "channel `{}` not found in team `{}`",
            plugin.post_channel, plugin.team_id
        ));
    }
    if directory.user_by_username(&plugin.post_user).await.is_err() {
        problems.push(format!("post user `{}` not found", plugin.post_user));
    }

    let counts = format!(
        "{} users and {} channels configured",
        directory.user_count(),
        directory.channel_count()
    );
    if problems.is_empty() {
        DoctorCheck { name: "directory_readiness", status: CheckStatus::Pass, details: counts }
    } else {
        DoctorCheck {
            name: "directory_readiness",
            status: CheckStatus::Warn,
            details: format!("{counts}; {}", problems.join("; ")),
        }
    }
}

async fn check_storage(config: &AppConfig) -> DoctorCheck {
    let pool = match connect_storage(&config.storage).await {
        Ok(pool) => pool,
        Err(error) => {
            return DoctorCheck {
                name: "storage_readiness",
                status: CheckStatus::Fail,
                details: format!("failed to connect to `{}`: {error}", config.storage.url),
            }
        }
    };

    let status = migrations::status(&pool).await;
    pool.close().await;

    let url = &config.storage.url;
    match status {
        Ok(status) if status.is_current() => DoctorCheck {
            name: "storage_readiness",
            status: CheckStatus::Pass,
            details: format!("connected using `{url}`; {} migrations applied", status.applied),
        },
        Ok(status) => DoctorCheck {
            name: "storage_readiness",
            status: CheckStatus::Warn,
            details: format!(
                "connected using `{url}`; {} of {} migrations applied (run `quotebot migrate`)",
                status.applied, status.known
            ),
        },
        Err(error) => DoctorCheck {
            name: "storage_readiness",
            status: CheckStatus::Fail,
            details: format!("connected using `{url}` but migration status failed: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
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
