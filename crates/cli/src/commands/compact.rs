//! `localmind compact`: run one compaction check in the foreground.

use super::{CmdResult, Runtime, load_config};
use localmind_agent::CompactionOutcome;
use localmind_config::CompactionMode;

pub async fn run(session: String, model: Option<String>) -> CmdResult {
    let mut config = load_config()?;
    // Never start the background worker for a one-off run.
    config.compaction.mode = CompactionMode::Inline;
    let runtime = Runtime::open(config).await?;
    let pipeline = runtime.pipeline();

    let summarizer = pipeline.resolve_summarizer(model.as_deref()).await;
    let policy = pipeline.engine().policy();
    println!(
        "Compacting '{session}' with {summarizer} (window {}, chunk {})",
        policy.active_window_size, policy.chunk_size
    );

    match pipeline.engine().check_and_compact(&session, &summarizer).await {
        CompactionOutcome::Skipped { unsummarized } => {
            println!("  Nothing to do: {unsummarized} unsummarized turn(s).");
        }
        CompactionOutcome::Compacted { chapter } => {
            println!(
                "  Chapter {} covers turns {}..={}:",
                chapter.id, chapter.start_turn_id, chapter.end_turn_id
            );
            println!("  {}", chapter.content);
        }
        CompactionOutcome::Failed { error } => {
            return Err(format!("Compaction failed: {error}").into());
        }
    }

    Ok(())
}
