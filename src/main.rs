//! # Handbook QA CLI (`hbq`)
//!
//! The `hbq` binary drives the full pipeline: database initialization,
//! manifest-driven ingestion, question answering, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! hbq --config ./config/hbq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hbq init` | Create the SQLite database and run schema migrations |
//! | `hbq ingest <manifest>` | Extract, chunk, embed, and store documents |
//! | `hbq ask "<question>"` | Answer a question from the ingested handbooks |
//! | `hbq status` | Print document, chunk, and embedding counts |
//! | `hbq delete <id>` | Delete a document and everything derived from it |
//! | `hbq serve` | Start the HTTP question-answering server |

mod answer;
mod chunk;
mod config;
mod db;
mod embedding;
mod error;
mod extract;
mod ingest;
mod migrate;
mod models;
mod normalize;
mod retrieve;
mod server;
mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::store::VectorStore;

/// Handbook QA — grounded question answering over institutional handbooks.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/hbq.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "hbq",
    about = "Handbook QA — grounded question answering over institutional handbooks",
    version,
    long_about = "Handbook QA ingests institutional documents (txt, pdf, docx), chunks and \
    embeds them into SQLite, and answers questions grounded in the retrieved passages, with \
    citations back to the source chunks. Available as a CLI and an HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/hbq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, chunks, embeddings). Idempotent.
    Init,

    /// Ingest documents listed in a manifest.
    ///
    /// For each document: extract text, normalize, chunk, embed, and
    /// store. Documents whose content is unchanged since a previous run
    /// are skipped; documents that fail extraction are reported and the
    /// batch continues.
    Ingest {
        /// Path to the ingestion manifest (TOML, `[[documents]]` entries).
        manifest: PathBuf,

        /// Show document and chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question from the ingested handbooks.
    ///
    /// Embeds the question, retrieves the nearest chunks by cosine
    /// distance, and prints a grounded answer with its citations.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of chunks to retrieve (defaults to `retrieval.top_k`).
        #[arg(long)]
        k: Option<i64>,
    },

    /// Print document, chunk, and embedding counts.
    Status,

    /// Delete a document by id, cascading to its chunks and embeddings.
    Delete {
        /// Document id.
        id: String,
    },

    /// Start the HTTP question-answering server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// `POST /ask`, `GET /status`, and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { manifest, dry_run } => {
            ingest::run_ingest(&cfg, &manifest, dry_run).await?;
        }
        Commands::Ask { question, k } => {
            run_ask(&cfg, &question, k).await?;
        }
        Commands::Status => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            let store = VectorStore::new(pool);
            let status = store.status().await?;
            println!("documents:  {}", status.documents);
            println!("chunks:     {}", status.chunks);
            println!("embeddings: {}", status.embeddings);
            store.pool().close().await;
        }
        Commands::Delete { id } => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            let store = VectorStore::new(pool);
            if store.delete_document(&id).await? {
                println!("Deleted document {id}.");
            } else {
                println!("No document with id {id}.");
            }
            store.pool().close().await;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_ask(cfg: &config::Config, question: &str, k: Option<i64>) -> anyhow::Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }
    let k = k.unwrap_or(cfg.retrieval.top_k);
    if k < 1 {
        anyhow::bail!("k must be >= 1");
    }

    let pool = db::connect(&cfg.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = VectorStore::new(pool);

    let embedder = embedding::create_embedder(&cfg.embedding)?;
    let generator = answer::create_generator(&cfg.generation)?;

    let chunks = retrieve::retrieve_top_k(embedder.as_ref(), &store, question, k).await?;
    let result = answer::answer_question(generator.as_ref(), question, &chunks).await?;

    println!("{}", result.answer);
    if !result.citations.is_empty() {
        println!();
        println!("Citations:");
        for c in &result.citations {
            println!("  [{}#{}] {}", c.document_id, c.chunk_index, c.snippet);
        }
    }

    store.pool().close().await;
    Ok(())
}
