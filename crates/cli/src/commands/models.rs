//! `localmind models`: list installed models, optionally pulling missing ones.

use super::{CmdResult, Runtime, load_config};
use localmind_core::provider::InferenceService;
use localmind_providers::ModelBootstrap;

pub async fn run(pull: bool) -> CmdResult {
    let config = load_config()?;
    let client = Runtime::inference_only(&config)?;

    if pull {
        let bootstrap = ModelBootstrap::new(config.bootstrap.required_models.clone(), true);
        let report = bootstrap.ensure(&client).await;
        for model in &report.ready {
            println!("  ready   {model}");
        }
        for model in &report.pulled {
            println!("  pulled  {model}");
        }
        for (model, error) in &report.failed {
            println!("  failed  {model}: {error}");
        }
        if let Some(error) = &report.listing_error {
            return Err(format!("Could not reach the model service: {error}").into());
        }
        println!();
    }

    let installed = client.list_models().await?;
    if installed.is_empty() {
        println!("No models installed.");
    }
    for name in installed {
        println!("{name}");
    }
    Ok(())
}
