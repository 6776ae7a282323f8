//! `localmind summary`: print a session's chapter narrative.

use super::{CmdResult, load_config};
use localmind_agent::session_narrative;
use localmind_memory::SqliteStore;

pub async fn run(session: String) -> CmdResult {
    let config = load_config()?;
    let store = SqliteStore::open(&config.database_path()).await?;

    let narrative = session_narrative(&store, &session).await?;
    if narrative.is_empty() {
        println!("No chapters yet for '{session}'.");
    } else {
        println!("{narrative}");
    }
    Ok(())
}
