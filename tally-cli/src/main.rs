use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tally_core::Operation;

mod config;
mod repl;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Chat-based ledger intake")]
struct Cli {
    /// Optional TOML config path
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat against an in-memory ledger
    Chat,

    /// One-shot rule-based parse of a phrase (no model involved)
    Parse {
        /// e.g. "spent 50 on lunch yesterday"
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config)?;

    match cli.command {
        Command::Chat => repl::run(&cfg).await?,

        Command::Parse { text } => {
            let now = Local::now().naive_local();
            let parsed = tally_core::parse_transaction(&text, now)
                .map(Operation::RegisterOne)
                .or_else(|| tally_core::parse_query(&text).map(Operation::Query));

            match parsed {
                Some(op) => println!("{}", serde_json::to_string_pretty(&op)?),
                None => println!("No rule matched; an LLM-backed deployment would handle this."),
            }
        }
    }

    Ok(())
}
