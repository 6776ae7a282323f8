//! `localmind reset`: delete all chat history and long-term memories.

use super::{CmdResult, load_config};
use localmind_core::memory::SemanticMemory;
use localmind_core::store::SessionStore;
use localmind_memory::{SqliteStore, SqliteVectorStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub async fn run(yes: bool) -> CmdResult {
    let config = load_config()?;
    let database = config.database_path();
    let vectors = config.vector_store_path();

    println!("WARNING: This will delete ALL chat history and long-term memories.");
    println!("   Target 1: {} (transcript, chapters, profiles)", database.display());
    println!("   Target 2: {} (vector store)", vectors.display());

    if !yes {
        print!("Type 'DELETE' to confirm: ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if answer.trim_end_matches(['\r', '\n']) != "DELETE" {
            println!("Aborted.");
            return Ok(());
        }
    }

    // Empty the tables first so a running server sees the reset immediately.
    if database.exists() {
        let store = SqliteStore::open(&database).await?;
        store.wipe().await?;
    }
    if vectors.exists() {
        let memory = SqliteVectorStore::open(&vectors).await?;
        memory.clear().await?;
    }

    report("SQLite database", remove_database(&database));
    report("Vector store", remove_database(&vectors));

    println!();
    println!("System clean. Restart the server to re-initialize fresh databases.");
    Ok(())
}

/// Remove a SQLite file and its WAL sidecars. `Ok(false)` when nothing existed.
fn remove_database(path: &Path) -> std::io::Result<bool> {
    let mut removed = false;
    for file in std::iter::once(path.to_path_buf()).chain(sidecars(path)) {
        match std::fs::remove_file(&file) {
            Ok(()) => removed = true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

fn sidecars(path: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    ["-wal", "-shm"].into_iter().map(move |suffix| {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    })
}

fn report(label: &str, result: std::io::Result<bool>) {
    match result {
        Ok(true) => println!("  {label} deleted."),
        Ok(false) => println!("  {label} not found."),
        Err(e) => {
            warn!(error = %e, "Delete failed");
            println!("  Error deleting {label}: {e}");
        }
    }
}
