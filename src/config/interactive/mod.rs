
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::settings::SUPPORTED_PROVIDERS;
use super::{Config, ConfigError, EmbedderConfig, IndexConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Nexus RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Embedder Configuration").bold().yellow());
    eprintln!("Choose how document and query text is turned into vectors.");
    eprintln!();

    configure_embedder(&mut config.embedder)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_index(&mut config.index)?;

    if config.embedder.provider == "ollama" {
        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_embedder_connection(&config.embedder) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before ingesting.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedder Settings:").bold().yellow());
    eprintln!("  Provider: {}", style(&config.embedder.provider).cyan());
    eprintln!("  Model: {}", style(&config.embedder.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedder.dimension).cyan());
    eprintln!("  Batch Size: {}", style(config.embedder.batch_size).cyan());
    match config.embedder_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Index Settings:").bold().yellow());
    eprintln!(
        "  Relevance threshold: {}",
        style(config.index.relevance_threshold).cyan()
    );
    eprintln!(
        "  Snapshot: {}",
        style(config.snapshot_path().display()).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!(
        "  Default top_n: {} (max {})",
        style(config.retrieval.default_top_n).cyan(),
        config.retrieval.max_top_n
    );
    eprintln!(
        "  Span: {} chars fallback, {} sentences of context",
        style(config.retrieval.chunk_size).cyan(),
        style(config.retrieval.context_size).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Memory Tree Settings:").bold().yellow());
    eprintln!(
        "  {} words per leaf, up to {} children per node",
        style(config.memory.chunk_size).cyan(),
        style(config.memory.max_children).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No valid configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_embedder(embedder: &mut EmbedderConfig) -> Result<()> {
    let default_provider = SUPPORTED_PROVIDERS
        .iter()
        .position(|&p| p == embedder.provider)
        .unwrap_or(0);

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_provider)
        .items(SUPPORTED_PROVIDERS)
        .interact()?;
    let provider = SUPPORTED_PROVIDERS[provider_index].to_string();

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedder.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (8..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 8 and 4096")
            }
        })
        .interact_text()?;

    embedder.set_provider(provider)?;
    embedder.set_dimension(dimension)?;

    if embedder.provider != "ollama" {
        return Ok(());
    }

    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedder.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(embedder.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = EmbedderConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..EmbedderConfig::default()
            };
            temp_config.embedder_url()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(embedder.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedder.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedder.set_protocol(protocol)?;
    embedder.set_host(host)?;
    embedder.set_port(port)?;
    embedder.set_model(model)?;

    Ok(())
}

fn configure_index(index: &mut IndexConfig) -> Result<()> {
    let threshold: f32 = Input::new()
        .with_prompt("Relevance threshold (results at or below are dropped)")
        .default(index.relevance_threshold)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if input.is_finite() && (-1.0..1.0).contains(input) {
                Ok(())
            } else {
                Err("Threshold must be in [-1.0, 1.0)")
            }
        })
        .interact_text()?;

    index.set_relevance_threshold(threshold)?;
    Ok(())
}

fn test_embedder_connection(embedder: &EmbedderConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        embedder.protocol, embedder.host, embedder.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
