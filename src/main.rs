use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use nexus_rag::commands::{
    check_health, delete_document, ingest_files, search_documents, show_document, show_status,
    show_tree,
};
use nexus_rag::config::{Config, run_interactive_config, show_config};
use nexus_rag::retrieval::SearchRequest;

#[derive(Parser)]
#[command(name = "nexus-rag")]
#[command(about = "A retrieval-augmented document store with semantic search")]
#[command(version)]
struct Cli {
    /// Data directory holding config.toml, the metadata store and the vector snapshot
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedder and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest one or more text files
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Override the content type guessed from the file extension
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Search stored documents by meaning
    Search {
        /// Natural-language query
        query: String,
        /// Maximum number of results
        #[arg(long)]
        top_n: Option<usize>,
        /// Include the full document content with each result
        #[arg(long)]
        include_content: bool,
        /// Maximum characters in each relevant span
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a stored document
    Get {
        /// Document ID
        id: i64,
        /// Print the document as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build the hierarchical memory tree of a stored document
    Tree {
        /// Document ID
        id: i64,
        /// Words per leaf chunk
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a stored document
    Delete {
        /// Document ID
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Show document and vector counts with a consistency report
    Status,
    /// Check that the embedder is reachable
    Health,
}

fn resolve_data_dir(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    match data_dir {
        Some(dir) => Ok(dir),
        None => Config::config_dir().context("Failed to resolve data directory"),
    }
}

/// Cancel the token on Ctrl-C so in-flight work stops before its next durable write
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&data_dir)?;
        } else {
            run_interactive_config(&data_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&data_dir)?;
    let cancel = cancel_on_interrupt();

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Ingest {
            paths,
            content_type,
        } => {
            ingest_files(config, &paths, content_type.as_deref(), &cancel).await?;
        }
        Commands::Search {
            query,
            top_n,
            include_content,
            chunk_size,
            json,
        } => {
            let request = SearchRequest::new(query)
                .with_top_n(top_n.unwrap_or(config.retrieval.default_top_n))
                .with_content(include_content)
                .with_chunk_size(chunk_size.unwrap_or(config.retrieval.chunk_size));
            search_documents(config, &request, json, &cancel).await?;
        }
        Commands::Get { id, json } => {
            show_document(config, id, json).await?;
        }
        Commands::Tree {
            id,
            chunk_size,
            json,
        } => {
            show_tree(config, id, chunk_size, json).await?;
        }
        Commands::Delete { id, yes } => {
            delete_document(config, id, yes).await?;
        }
        Commands::Status => {
            show_status(config).await?;
        }
        Commands::Health => {
            check_health(config).await?;
        }
    }

    Ok(())
}
