//! `roundtable config`: Configuration management commands.

use roundtable_config::{ExecutionMode, RoundtableConfig};
use std::path::Path;

use super::load_config;

pub async fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match load_config(path) {
        Ok(config) => {
            println!("   ok: config parsed and validated");

            let mut warnings = Vec::new();

            if config.executor.mode == ExecutionMode::Sequential
                && config.executor.max_concurrency > 1
            {
                warnings.push("executor.max_concurrency is ignored in sequential mode");
            }

            if config.agent.max_iterations == 1 {
                warnings.push("agent.max_iterations = 1 means every session runs without tools");
            }

            if warnings.is_empty() {
                println!("   ok: all checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Model:        {}", config.agent.model);
            println!("   Rounds:       {}", config.agent.max_iterations);
            println!(
                "   Executor:     {:?} (cap {})",
                config.executor.mode, config.executor.max_concurrency
            );
            println!("   Planning:     {}", config.planning.enabled);
            println!("   Quirk models: {}", config.model_quirks.models.join(", "));
        }
        Err(e) => {
            println!("   error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path).map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.to_toml()?);
    Ok(())
}

pub async fn init(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(RoundtableConfig::config_path);

    if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
        return Ok(());
    }

    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&config_path, RoundtableConfig::default_toml())?;
    println!("Created {}", config_path.display());
    Ok(())
}

pub async fn path(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(RoundtableConfig::config_path);
    println!("{}", config_path.display());
    Ok(())
}
