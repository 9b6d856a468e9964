use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::engine::Engine;
use crate::ingest::Upload;
use crate::memory::MemoryNode;
use crate::retrieval::SearchRequest;

/// Ingest one or more files, reporting each stored document
#[inline]
pub async fn ingest_files(
    config: Config,
    paths: &[PathBuf],
    content_type: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    let engine = Engine::open(config)
        .await
        .context("Failed to open document store")?;
    let ingestor = engine.ingestor();

    let bar = if paths.len() > 1 {
        ProgressBar::new(paths.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut failed = 0usize;
    for path in paths {
        bar.set_message(path.display().to_string());

        let outcome = match Upload::from_path(path, content_type).await {
            Ok(upload) => ingestor.ingest(upload, cancel).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(receipt) => {
                bar.println(format!(
                    "{} {} (ID: {}, vector {}, {} chars, {})",
                    style("✓").green(),
                    receipt.title,
                    receipt.id,
                    receipt.vector_id,
                    receipt.text_length,
                    receipt.encoding
                ));
            }
            Err(e) => {
                failed += 1;
                error!("Failed to ingest {}: {}", path.display(), e);
                bar.println(format!("{} {}: {}", style("✗").red(), path.display(), e));
            }
        }
        bar.inc(1);

        if cancel.is_cancelled() {
            break;
        }
    }
    bar.finish_and_clear();
    engine.close().await;

    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} uploads failed",
            failed,
            paths.len()
        ));
    }

    info!("Ingested {} files", paths.len());
    Ok(())
}

/// Run a search and print the ranked results
#[inline]
pub async fn search_documents(
    config: Config,
    request: &SearchRequest,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let engine = Engine::open(config)
        .await
        .context("Failed to open document store")?;
    let response = engine.retriever().search(request, cancel).await;
    engine.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", style(&response.message).bold());
    for (rank, hit) in response.results.iter().enumerate() {
        println!();
        println!(
            "{}. {} (ID: {}, score {:.3})",
            rank + 1,
            style(&hit.title).cyan(),
            hit.id,
            hit.similarity_score
        );
        println!("   {}", hit.relevant_span);
        if let Some(content) = &hit.content {
            println!();
            println!("{content}");
        }
    }

    Ok(())
}

/// Print one stored document
#[inline]
pub async fn show_document(config: Config, id: i64, json: bool) -> Result<()> {
    let engine = Engine::open(config)
        .await
        .context("Failed to open document store")?;
    let document = engine.retriever().get_document(id).await;
    engine.close().await;
    let document = document?;

    if json {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    println!("{} (ID: {})", style(&document.title).bold().cyan(), document.id);
    println!("  Vector ID: {}", document.vector_id);
    println!("  Content type: {}", document.content_type);
    println!("  Encoding: {}", document.encoding);
    println!("  Length: {} characters", document.text_length);
    println!("  Created: {}", document.created_at);
    if !document.metadata.is_empty() {
        println!(
            "  Metadata: {}",
            serde_json::to_string(&document.metadata)?
        );
    }
    println!();
    println!("{}", document.content);

    Ok(())
}

/// Build and print the memory tree of a stored document
#[inline]
pub async fn show_tree(config: Config, id: i64, chunk_size: Option<usize>, json: bool) -> Result<()> {
    let engine = Engine::open(config)
        .await
        .context("Failed to open document store")?;
    let tree = engine.retriever().memory_tree(id, chunk_size).await;
    engine.close().await;
    let tree = tree?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    println!(
        "{} {} leaves, {} nodes, height {}",
        style("🌳 Memory tree:").bold(),
        tree.leaf_count(),
        tree.node_count(),
        tree.height()
    );
    print_node(&tree, 0);
    Ok(())
}

fn print_node(node: &MemoryNode, depth: usize) {
    let marker = if node.is_leaf() { "•" } else { "▸" };
    println!("{}{} {}", "  ".repeat(depth), marker, node.summary);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

/// Retract a stored document after confirmation
#[inline]
pub async fn delete_document(config: Config, id: i64, assume_yes: bool) -> Result<()> {
    let engine = Engine::open(config)
        .await
        .context("Failed to open document store")?;
    let document = engine.retriever().get_document(id).await?;

    println!("Found document: {} (ID: {})", document.title, document.id);
    println!("Its vector stays in the index but will no longer match any search.");

    let confirmed = assume_yes
        || Confirm::new()
            .with_prompt("Delete this document? This action cannot be undone.")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

    if !confirmed {
        println!("Aborted.");
        engine.close().await;
        return Ok(());
    }

    engine.ingestor().retract(id).await?;
    engine.close().await;
    println!("{} Document deleted", style("✓").green());
    Ok(())
}

/// Print store counts and the consistency report
#[inline]
pub async fn show_status(config: Config) -> Result<()> {
    let engine = Engine::open(config)
        .await
        .context("Failed to open document store")?;
    let status = engine.status().await;
    let base_dir = engine.config().get_base_dir().display().to_string();
    engine.close().await;
    let status = status?;

    println!("📊 Nexus RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();
    println!("🗂️  Data directory: {base_dir}");
    println!("🤖 Embedder: {} (dimension {})", status.model, status.dimension);
    println!("🔍 Relevance threshold: {}", status.relevance_threshold);
    println!("📄 Documents: {}", status.documents);
    println!("🧮 Vectors: {}", status.vectors);
    println!();

    if status.consistency.is_consistent {
        println!("   ✅ {}", status.consistency.summary());
    } else {
        println!("   ⚠️  {}", status.consistency.summary());
    }

    Ok(())
}

/// Check that the configured embedder answers with vectors of the configured width
#[inline]
pub async fn check_health(config: Config) -> Result<()> {
    println!("🤖 Embedder: {}", config.embedder.provider);

    if config.embedder.provider == "ollama" {
        let client = OllamaClient::new(&config.embedder)?;
        match tokio::task::spawn_blocking(move || client.health_check()).await? {
            Ok(()) => println!(
                "   ✅ Ollama: Connected ({}:{}), model {}",
                config.embedder.host, config.embedder.port, config.embedder.model
            ),
            Err(e) => {
                println!("   ❌ Ollama: {e:#}");
                return Err(e);
            }
        }
    }

    let embedder = crate::embeddings::create_embedder(&config.embedder)?;
    let expected = config.dimension();
    let vector = tokio::task::spawn_blocking(move || embedder.embed("health check")).await??;

    if vector.len() == expected {
        println!("   ✅ Embedding dimension: {}", vector.len());
        Ok(())
    } else {
        println!(
            "   ❌ Embedding dimension: got {}, configured {}",
            vector.len(),
            expected
        );
        Err(anyhow::anyhow!(
            "Embedder returned {} dimensions, expected {}",
            vector.len(),
            expected
        ))
    }
}
