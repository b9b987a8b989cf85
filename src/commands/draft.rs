//! Local draft commands: new, validate, schema

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use strategy_builder::indicators::default_params;
use strategy_builder::{
    ExitPreset, Indicator, Operator, StrategyConfiguration, COMMON_CROSSES,
};
use tracing::info;

/// Read a draft configuration from a JSON file
pub fn read_draft(path: &Path) -> Result<StrategyConfiguration> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read draft {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse draft {}", path.display()))
}

pub fn new_draft(output: Option<PathBuf>) -> Result<()> {
    let draft = StrategyConfiguration::canonical_default();
    let json = serde_json::to_string_pretty(&draft)?;

    match output {
        Some(path) => {
            fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Default draft written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub fn validate(file: PathBuf) -> Result<()> {
    let draft = read_draft(&file)?;
    println!("{}", draft);
    draft
        .validate()
        .with_context(|| format!("{} is not ready for backtest", file.display()))?;
    println!("OK: ready for backtest");
    Ok(())
}

pub fn schema() -> Result<()> {
    println!("Indicators:");
    for indicator in Indicator::ALL {
        let params: Vec<String> = default_params(indicator)
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!("  {:<16} {:<16} {}", indicator.as_str(), indicator.label(), params.join(", "));
    }

    println!("\nOperators:");
    for operator in Operator::ALL {
        println!("  {:<16} {:<14} {:?}", operator.as_str(), operator.symbol(), operator.shape());
    }

    println!("\nExit presets:");
    for preset in ExitPreset::ALL {
        let json = serde_json::to_string(&preset.exit_condition())?;
        println!("  {:<18} {:<44} {}", preset.label(), preset.description(), json);
    }

    println!("\nCommon crosses:");
    for cross in COMMON_CROSSES {
        println!("  {}", cross.label);
    }
    Ok(())
}
