//! `localmind chat`: interactive or single-message chat mode.

use super::{CmdResult, Runtime, load_config};
use localmind_agent::{TurnPipeline, TurnRequest};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>, session: String, model: Option<String>) -> CmdResult {
    let config = load_config()?;
    let model = model.unwrap_or_else(|| config.default_model.clone());
    let runtime = Runtime::open(config).await?;
    let pipeline = runtime.pipeline();

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let result = pipeline.handle(TurnRequest::new(&session, msg, &model)).await;
        eprint!("\r              \r");
        let turn = result?;
        println!("{}", turn.response);
        if let Some(memory) = turn.new_memory {
            eprintln!("  [remembered] {}", memory.content);
        }
        finish(&pipeline).await;
        return Ok(());
    }

    println!();
    println!("  LocalMind, interactive mode");
    println!();
    println!("  Model:     {model}");
    println!("  Session:   {session}");
    println!("  Data:      {}", runtime.config.data_dir().display());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        eprint!("  ...");
        match pipeline.handle(TurnRequest::new(&session, line, &model)).await {
            Ok(turn) => {
                eprint!("\r     \r");
                println!();
                for text in turn.response.lines() {
                    println!("  Assistant > {text}");
                }
                if let Some(memory) = turn.new_memory {
                    println!("  [remembered] {}", memory.content);
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    finish(&pipeline).await;
    println!("  Goodbye!");
    Ok(())
}

/// Let queued compactions land before the process exits.
async fn finish(pipeline: &TurnPipeline) {
    if let Some(scheduler) = pipeline.scheduler() {
        scheduler.flush().await;
    }
    pipeline.shutdown().await;
}
