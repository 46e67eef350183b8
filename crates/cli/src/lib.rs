pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use classcover_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "classcover",
    about = "Classcover operator CLI",
    long_about = "Operate Classcover database migrations, demo timetable seeding, config inspection, and readiness checks.",
    after_help = "Examples:\n  classcover doctor --json\n  classcover migrate\n  classcover seed"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo timetable and verify the seeded rows")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config, database connectivity, and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        logging::init(&config.logging);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
