pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "quotebot",
    about = "Quotebot operator CLI",
    long_about = "Inspect Quotebot configuration, check readiness, apply migrations, \
                  and read the persisted quote list.",
    after_help = "Examples:\n  quotebot doctor --json\n  quotebot config\n  quotebot quotes list"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, directory readiness, and storage connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Read the persisted quote list")]
    Quotes {
        #[command(subcommand)]
        command: QuotesCommand,
    },
}

#[derive(Debug, Subcommand)]
enum QuotesCommand {
    #[command(about = "List stored quotes with their 1-based numbers")]
    List,
    #[command(about = "Write the stored quotes to a file as a JSON array")]
    Export {
        #[arg(help = "Destination file")]
        path: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Quotes { command: QuotesCommand::List } => commands::quotes::list(),
        Command::Quotes { command: QuotesCommand::Export { path } } => {
            commands::quotes::export(&path)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
