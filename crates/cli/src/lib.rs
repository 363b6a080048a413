pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "challan",
    about = "Challan operator CLI",
    long_about = "Prepare the challan database, load reference data, check readiness and inspect approval queues.",
    after_help = "Examples:\n  challan migrate\n  challan seed\n  challan doctor --json\n  challan summary"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the reference identities and device catalog (idempotent)")]
    Seed,
    #[command(about = "Validate config, DB connectivity, schema state and reference data")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Count challans waiting at each approval stage")]
    Summary,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Doctor { json } => {
            let (exit_code, output) = commands::doctor::run(json);
            commands::CommandResult { exit_code, output }
        }
        Command::Summary => commands::summary::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
