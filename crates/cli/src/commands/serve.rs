//! `localmind serve`: start the HTTP API server.

use super::{CmdResult, load_config};

pub async fn run(port_override: Option<u16>) -> CmdResult {
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("LocalMind Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:      {}", config.default_model);
    println!("   Compaction: {:?}", config.compaction.mode);

    localmind_gateway::start(config).await?;

    Ok(())
}
