pub mod commands;
pub mod logging;
pub mod sink;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "querygate",
    about = "Guarded natural-language questions over the demo sales database",
    long_about = "Screen a question for data-modification intent, answer it with a read-only \
SQL agent, and manage the demo database the agent queries.",
    after_help = "Examples:\n  querygate migrate\n  querygate seed\n  \
querygate ask \"Quais clientes compraram um Notebook?\"\n  querygate demo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one question through the guarded pipeline and print the answer")]
    Ask {
        #[arg(help = "Question in natural language")]
        question: String,
    },
    #[command(about = "Prepare the demo database and run the built-in sample questions")]
    Demo,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo customers, products and transactions (idempotent)")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { question } => commands::ask::run(&question),
        Command::Demo => commands::demo::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
