//! Athenaeum CLI
//!
//! Command-line demo harness for the personal-knowledge retrieval engine:
//! ingest local text, ask a question, or inspect index statistics.

use std::path::PathBuf;
use std::sync::Arc;

use athenaeum_core::{
    BrainIntegration, BrainPaths, Category, EngineConfig, IngestProgress, KnowledgeBrain, MemoryPaths,
    UnifiedMemory,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use directories::ProjectDirs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Athenaeum - local-first personal knowledge retrieval engine
#[derive(Parser)]
#[command(name = "athenaeum")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI demo for the athenaeum retrieval engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a text file into the corpus
    Ingest {
        /// Path to the file to ingest
        path: PathBuf,
        /// Source label attached to every chunk (defaults to the file name)
        #[arg(long)]
        source: Option<String>,
        /// Category tag (email, notes, documents, calendar, messages, web, other)
        #[arg(long)]
        category: Option<String>,
    },

    /// Ask a question against the ingested corpus and memory
    Ask {
        /// The question to ask
        query: String,
        /// Allow web search for personal/hybrid queries (no collaborator wired in the demo)
        #[arg(long)]
        web: bool,
    },

    /// Show corpus and memory statistics
    Stats,
}

fn parse_category(raw: &str) -> anyhow::Result<Category> {
    match raw.to_lowercase().as_str() {
        "email" => Ok(Category::Email),
        "notes" => Ok(Category::Notes),
        "documents" => Ok(Category::Documents),
        "calendar" => Ok(Category::Calendar),
        "messages" => Ok(Category::Messages),
        "web" => Ok(Category::Web),
        "other" => Ok(Category::Other),
        other => anyhow::bail!("unknown category '{other}' (expected email, notes, documents, calendar, messages, web, other)"),
    }
}

struct Paths {
    brain: BrainPaths,
    memory: MemoryPaths,
}

fn resolve_paths() -> anyhow::Result<Paths> {
    let dirs = ProjectDirs::from("com", "athenaeum", "core")
        .ok_or_else(|| anyhow::anyhow!("could not determine a data directory for this platform"))?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;

    Ok(Paths {
        brain: BrainPaths {
            bm25_index: data_dir.join("bm25_index.json"),
            metadata: data_dir.join("metadata.json"),
            knowledge_graph: data_dir.join("knowledge_graph.sqlite"),
        },
        memory: MemoryPaths {
            semantic: data_dir.join("semantic.json"),
            episodic: data_dir.join("episodic.json"),
            procedural: data_dir.join("procedural.json"),
        },
    })
}

fn build_integration(paths: &Paths) -> BrainIntegration {
    let embedder: Arc<dyn athenaeum_core::Embedder> =
        Arc::new(athenaeum_core::CachedEmbedder::new(athenaeum_core::HashingEmbedder::default(), 256));
    let vector_index: Arc<dyn athenaeum_core::VectorIndex> =
        Arc::new(athenaeum_core::BruteForceVectorIndex::new(athenaeum_core::HashingEmbedder::default()));

    let config = EngineConfig::default();
    let brain = KnowledgeBrain::load(&paths.brain, config.clone(), vector_index);
    let memory = UnifiedMemory::load(&paths.memory.semantic, &paths.memory.episodic, &paths.memory.procedural);

    BrainIntegration::new(
        config,
        athenaeum_core::ContextBudget::STANDARD,
        "You are a helpful personal assistant.".to_string(),
        brain,
        memory,
        paths.memory.clone(),
        embedder,
        None,
    )
}

async fn run_ingest(path: PathBuf, source: Option<String>, category: Option<String>) -> anyhow::Result<()> {
    println!("{}", "=== Athenaeum Ingest ===".cyan().bold());
    println!();

    let content = std::fs::read_to_string(&path)?;
    let source = source.unwrap_or_else(|| {
        path.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "untitled".to_string())
    });
    let category = category.as_deref().map(parse_category).transpose()?;

    let paths = resolve_paths()?;
    let mut integration = build_integration(&paths);

    // Demonstrate the broadcast-channel fan-out pattern alongside the
    // direct `FnMut` callback `KnowledgeBrain::ingest` takes.
    let (progress_tx, mut progress_rx) = tokio::sync::broadcast::channel::<IngestProgress>(64);
    let reporter = tokio::spawn(async move {
        while let Ok(update) = progress_rx.recv().await {
            println!("  [{:>3.0}%] {}", update.fraction * 100.0, update.stage);
        }
    });

    let chunks = integration
        .ingest(&content, &source, category, std::collections::HashMap::new(), &paths.brain, |update| {
            let _ = progress_tx.send(update);
        })
        .await?;
    drop(progress_tx);
    let _ = reporter.await;

    println!();
    println!("{}", format!("Ingested {chunks} chunk(s) from {}", source.as_str()).green().bold());
    Ok(())
}

async fn run_ask(query: String, web: bool) -> anyhow::Result<()> {
    println!("{}", "=== Athenaeum Ask ===".cyan().bold());
    println!();

    let paths = resolve_paths()?;
    let mut integration = build_integration(&paths);

    let (augmented, source_count) = integration.process_message(&query, web, &[]).await;

    println!("{}: {}", "Sources included".white().bold(), source_count);
    println!();
    println!("{augmented}");

    integration.record_interaction(&query, "(no downstream model wired in the CLI demo)", None).await;
    Ok(())
}

fn run_stats() -> anyhow::Result<()> {
    println!("{}", "=== Athenaeum Stats ===".cyan().bold());
    println!();

    let paths = resolve_paths()?;
    let vector_index: Arc<dyn athenaeum_core::VectorIndex> =
        Arc::new(athenaeum_core::BruteForceVectorIndex::new(athenaeum_core::HashingEmbedder::default()));
    let brain = KnowledgeBrain::load(&paths.brain, EngineConfig::default(), vector_index);
    let memory = UnifiedMemory::load(&paths.memory.semantic, &paths.memory.episodic, &paths.memory.procedural);

    println!("{}: {}", "Indexed chunks".white().bold(), brain.chunk_count());
    println!("{}: {}", "Semantic memories".white().bold(), memory.semantic_count());
    println!("{}: {}", "Episodic memories".white().bold(), memory.episodic_count());
    println!("{}: {}", "Data directory".white().bold(), paths.brain.bm25_index.parent().unwrap().display());

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    info!("athenaeum v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Ingest { path, source, category } => run_ingest(path, source, category).await,
        Commands::Ask { query, web } => run_ask(query, web).await,
        Commands::Stats => run_stats(),
    }
    .inspect_err(|e| warn!("command failed: {e}"))
}
