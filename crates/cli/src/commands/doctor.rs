use cartline_agent::HttpLlmClient;
use cartline_core::config::{AppConfig, ConfigError, LoadOptions};
use cartline_db::{connect_with_settings, migrations};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;

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

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["database_connectivity", "whatsapp_readiness", "llm_readiness", "crm_readiness"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            serde_json::json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(loaded: Result<AppConfig, ConfigError>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_database(&config));
            checks.push(check_whatsapp(&config));
            checks.push(check_llm(&config));
            checks.push(check_crm(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Fail,
                error.to_string(),
            ));
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| {
                DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                )
            }));
        }
    }

    // Disabled collaborators are skipped, not failed.
    let healthy = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if healthy { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if healthy {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let applied = migrations::run_pending(&pool).await;
        pool.close().await;
        applied.map_err(|error| format!("migrations failed: {error}"))
    });

    match result {
        Ok(()) => DoctorCheck::new(
            "database_connectivity",
            CheckStatus::Pass,
            format!("connected and migrated `{}`", config.database.url),
        ),
        Err(error) => DoctorCheck::new("database_connectivity", CheckStatus::Fail, error),
    }
}

fn check_whatsapp(config: &AppConfig) -> DoctorCheck {
    let whatsapp = &config.whatsapp;
    if !whatsapp.enabled {
        return DoctorCheck::new(
            "whatsapp_readiness",
            CheckStatus::Skipped,
            "whatsapp disabled; the webhook route is not mounted",
        );
    }

    if whatsapp.auth_token.expose_secret().trim().is_empty() {
        return DoctorCheck::new(
            "whatsapp_readiness",
            CheckStatus::Fail,
            "whatsapp.auth_token is empty",
        );
    }

    DoctorCheck::new(
        "whatsapp_readiness",
        CheckStatus::Pass,
        format!(
            "twilio sender from {} ({} attempt(s) per message)",
            whatsapp.from_number, whatsapp.max_send_attempts
        ),
    )
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    if !config.llm.enabled {
        return DoctorCheck::new(
            "llm_readiness",
            CheckStatus::Skipped,
            "llm disabled; the keyword selector drives the planner",
        );
    }

    match HttpLlmClient::from_config(&config.llm) {
        Ok(_) => DoctorCheck::new(
            "llm_readiness",
            CheckStatus::Pass,
            format!("{:?} client built for model `{}`", config.llm.provider, config.llm.model),
        ),
        Err(error) => DoctorCheck::new("llm_readiness", CheckStatus::Fail, error.to_string()),
    }
}

fn check_crm(config: &AppConfig) -> DoctorCheck {
    let crm = &config.crm;
    if !crm.enabled {
        return DoctorCheck::new(
            "crm_readiness",
            CheckStatus::Skipped,
            "crm disabled; using the in-memory demo catalog and order gateway",
        );
    }

    let has_token =
        crm.access_token.as_ref().is_some_and(|token| !token.expose_secret().trim().is_empty());
    match (&crm.instance_url, has_token) {
        (Some(url), true) => DoctorCheck::new(
            "crm_readiness",
            CheckStatus::Pass,
            format!("salesforce at {url} (api {})", crm.api_version),
        ),
        (None, _) => DoctorCheck::new(
            "crm_readiness",
            CheckStatus::Fail,
            "crm.instance_url is not configured",
        ),
        (Some(_), false) => DoctorCheck::new(
            "crm_readiness",
            CheckStatus::Fail,
            "crm.access_token is not configured",
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

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
