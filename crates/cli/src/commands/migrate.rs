use crate::commands::CommandResult;
use cartline_core::config::{AppConfig, DatabaseConfig, LoadOptions};
use cartline_db::connect_with_settings;
use cartline_db::migrations::{self, MigrationReport};

const COMMAND: &str = "migrate";

/// A failed step: error class, detail and the exit code it maps to.
type StepFailure = (&'static str, String, u8);

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let outcome = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| {
            ("runtime_init", format!("failed to initialize async runtime: {error}"), 3)
        })
        .and_then(|runtime| runtime.block_on(apply(&config.database)));

    match outcome {
        Ok(report) => CommandResult::success(COMMAND, summarize(&report, &config.database.url)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(COMMAND, error_class, message, exit_code)
        }
    }
}

async fn apply(database: &DatabaseConfig) -> Result<MigrationReport, StepFailure> {
    let pool =
        connect_with_settings(&database.url, database.max_connections, database.timeout_secs)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

    let report = migrations::run_pending_with_report(&pool).await;
    pool.close().await;
    report.map_err(|error| ("migration", error.to_string(), 5))
}

fn summarize(report: &MigrationReport, url: &str) -> String {
    if report.is_noop() {
        return format!(
            "schema already current at `{url}` ({} migration(s) previously applied)",
            report.previously_applied
        );
    }

    let applied = report
        .applied
        .iter()
        .map(|(version, description)| format!("{version:04} {description}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("applied {} migration(s) at `{url}`: {applied}", report.applied.len())
}

#[cfg(test)]
mod tests {
    use cartline_db::migrations::MigrationReport;

    use super::summarize;

    #[test]
    fn summary_names_each_applied_version() {
        let report = MigrationReport {
            applied: vec![(1, "conversation session".into()), (2, "transcript message".into())],
            previously_applied: 0,
        };

        assert_eq!(
            summarize(&report, "sqlite://cart.db"),
            "applied 2 migration(s) at `sqlite://cart.db`: \
             0001 conversation session, 0002 transcript message"
        );
    }

    #[test]
    fn summary_of_an_up_to_date_schema_counts_earlier_runs() {
        let report = MigrationReport { applied: Vec::new(), previously_applied: 2 };

        assert_eq!(
            summarize(&report, "sqlite://cart.db"),
            "schema already current at `sqlite://cart.db` (2 migration(s) previously applied)"
        );
    }
}
