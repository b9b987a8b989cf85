//! Store-backed commands: list, show, delete, save

use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use strategy_builder::store::ConfiguredStore;
use strategy_builder::{Config, StrategyBuilder, StrategyId};
use tracing::{info, warn};

use super::draft::read_draft;

#[derive(Debug)]
pub enum StoreAction {
    List,
    Show(i64),
    Delete(i64),
    Save { file: PathBuf, name: String },
}

pub fn run(config_path: Option<PathBuf>, action: StoreAction) -> Result<()> {
    dotenv::dotenv().ok();

    let config = match &config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config, action))
}

async fn run_async(config: Config, action: StoreAction) -> Result<()> {
    let store = config.store.open()?;
    info!("Using {}", store.describe());
    let mut builder = StrategyBuilder::new(store);

    match action {
        StoreAction::List => list(&mut builder).await,
        StoreAction::Show(id) => show(&mut builder, StrategyId(id)).await,
        StoreAction::Delete(id) => delete(&mut builder, StrategyId(id)).await,
        StoreAction::Save { file, name } => save(&mut builder, file, &name).await,
    }
}

async fn list(builder: &mut StrategyBuilder<ConfiguredStore>) -> Result<()> {
    builder
        .fetch_saved_strategies()
        .await
        .context("Failed to fetch saved strategies")?;

    let saved = builder.saved_strategies();
    if saved.is_empty() {
        println!("No saved strategies");
        return Ok(());
    }
    println!("{:>6}  NAME", "ID");
    for strategy in saved {
        println!("{:>6}  {}", strategy.id, strategy.name);
    }
    Ok(())
}

async fn show(builder: &mut StrategyBuilder<ConfiguredStore>, id: StrategyId) -> Result<()> {
    let strategy = builder
        .load_strategy(id)
        .await
        .ok_or_else(|| anyhow!("Strategy {} could not be loaded", id))?;

    println!("{} (#{})", strategy.name, strategy.id);
    println!("{}", builder.draft());
    match builder.validate_draft() {
        Ok(()) => println!("Ready for backtest"),
        Err(e) => println!("Not ready for backtest: {}", e),
    }
    println!("{}", serde_json::to_string_pretty(builder.draft())?);
    Ok(())
}

async fn delete(builder: &mut StrategyBuilder<ConfiguredStore>, id: StrategyId) -> Result<()> {
    let Some(report) = builder.delete_strategy(id).await? else {
        bail!("Strategy id must be a positive number, got {}", id);
    };

    println!("Deleted strategy {}", report.id);
    match report.refresh_error {
        Some(e) => println!("Strategy list could not be refreshed: {}", e),
        None => println!("{} saved strategies remain", builder.saved_strategies().len()),
    }
    Ok(())
}

async fn save(
    builder: &mut StrategyBuilder<ConfiguredStore>,
    file: PathBuf,
    name: &str,
) -> Result<()> {
    let draft = read_draft(&file)?;

    // The duplicate-name check runs against this list
    if builder.fetch_saved_strategies().await.is_err() {
        warn!("Saving without a local duplicate check");
    }

    builder
        .import_draft(draft)
        .with_context(|| format!("{} holds values the builder does not accept", file.display()))?;

    let report = builder.save_strategy(name).await?;
    println!("Saved '{}' as #{}", report.strategy.name, report.strategy.id);
    if let Some(e) = report.refresh_error {
        println!("Strategy list could not be refreshed: {}", e);
    }
    Ok(())
}
