pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cartline",
    about = "Cartline operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations, and talk to the \
                  shopping assistant locally.",
    after_help = "Examples:\n  cartline doctor --json\n  cartline config\n  cartline chat"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Print effective configuration values with their source and redaction")]
    Config,
    #[command(about = "Validate config, database connectivity, and channel readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Chat with the assistant in this terminal against the demo catalog")]
    Chat {
        #[arg(long, help = "Resume or name the session instead of generating one")]
        session: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Migrate => commands::migrate::run(),
        Command::Chat { session } => commands::chat::run(session),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
