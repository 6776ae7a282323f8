//! `localmind summarizers`: which preferred summarizer models are installed.

use super::{CmdResult, Runtime, load_config};
use localmind_core::provider::InferenceService;
use localmind_providers::{select_summarizer, summarizer_status};

pub async fn run() -> CmdResult {
    let config = load_config()?;
    let client = Runtime::inference_only(&config)?;
    let installed = client.list_models().await?;

    let preferred = &config.summarizer.preferred;
    let status = summarizer_status(&installed, preferred);
    let selected = select_summarizer(&installed, preferred, &config.summarizer.fallback);

    println!("Available: {}", list_or_none(&status.available));
    println!("Missing:   {}", list_or_none(&status.missing));
    println!("Selected:  {selected}");
    Ok(())
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}
