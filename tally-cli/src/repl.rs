//! Local chat REPL: the full bot flow over in-memory collaborators, with a
//! live model when an API key is available.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;

use tally_engine::bot::{Bot, InboundBody, InboundMessage};
use tally_engine::mem::{MemDirectory, MemHistory, MemLedger, MemTransport};
use tally_engine::{OpenAiClient, User};

use crate::config::Config;

pub async fn run(cfg: &Config) -> Result<()> {
    let user = User {
        id: 1,
        display_name: cfg.demo.name.clone(),
        phone: cfg.demo.phone.clone(),
        is_active: true,
    };

    let mut bot = Bot::new(
        Arc::new(MemDirectory::new(vec![user])),
        Arc::new(MemLedger::default()),
        Arc::new(MemTransport::default()),
    )
    .with_history(Arc::new(MemHistory::default()));

    match std::env::var(&cfg.llm.api_key_env) {
        Ok(key) if !key.is_empty() => {
            let mut client = OpenAiClient::new(key, cfg.llm.model.clone());
            if let Some(base) = &cfg.llm.base_url {
                client = client.with_base_url(base.clone());
            }
            bot = bot.with_model(Arc::new(client));
            println!("tally — chatting with model {} (ledger is in-memory)", cfg.llm.model);
        }
        _ => {
            println!(
                "tally — no {} set, using rule-based parsing (ledger is in-memory)",
                cfg.llm.api_key_env
            );
        }
    }
    println!("Type a message, or 'quit' to leave.\n");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        let reply = bot
            .handle(
                InboundMessage {
                    from: cfg.demo.phone.clone(),
                    body: InboundBody::Text(line.to_string()),
                },
                Local::now().naive_local(),
            )
            .await?;
        println!("{reply}\n");
    }

    Ok(())
}
