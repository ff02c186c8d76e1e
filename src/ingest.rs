//! Ingestion pipeline orchestration.
//!
//! Drives the full flow for every document in a manifest: extract →
//! normalize → chunk → embed → store. Each document runs in isolation: a
//! failure at any step (extraction, chunking, storage) is reported and
//! counted, and the batch continues with the next entry. Unchanged
//! documents (matching dedup hash with embeddings on disk) are skipped; a
//! document whose hash matches but has no embeddings is a leftover from an
//! interrupted run and is dropped and re-ingested.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::chunk::{chunk_by_separator, chunk_cascade, ChunkOptions, TextChunk};
use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, embed_batch, Embedder};
use crate::extract::extract_file;
use crate::migrate;
use crate::models::{DocumentSpec, Manifest, NewDocument, StoredChunk};
use crate::normalize::normalize_text;
use crate::store::VectorStore;

pub async fn run_ingest(config: &Config, manifest_path: &Path, dry_run: bool) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;

    // Fail fast before any document is touched: ingestion without real
    // vectors would write chunks that can never be retrieved.
    let embedder = if dry_run {
        None
    } else {
        Some(create_embedder(&config.embedding)?)
    };

    ingest_manifest(config, &manifest, dry_run, embedder).await
}

async fn ingest_manifest(
    config: &Config,
    manifest: &Manifest,
    dry_run: bool,
    embedder: Option<Arc<dyn Embedder>>,
) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = VectorStore::new(pool);

    let chunk_opts = config.chunking.options();
    chunk_opts.validate()?;

    let mut processed = 0u64;
    let mut skipped = 0u64;
    let mut failed = 0u64;
    let mut chunks_written = 0u64;
    let mut embeddings_written = 0u64;
    let mut embeddings_degraded = 0u64;
    let mut estimated_chunks = 0u64;

    for spec in &manifest.documents {
        let outcome =
            ingest_document(&store, embedder.as_ref(), config, &chunk_opts, spec, dry_run).await;
        match outcome {
            Ok(DocOutcome::Unchanged) => {
                println!("  unchanged: {}", spec.title);
                skipped += 1;
            }
            Ok(DocOutcome::Estimated(chunks)) => {
                println!("  would ingest: {} ({chunks} chunks)", spec.title);
                estimated_chunks += chunks as u64;
                processed += 1;
            }
            Ok(DocOutcome::Ingested {
                chunks,
                embeddings,
                degraded,
            }) => {
                println!("  ingested: {} ({chunks} chunks)", spec.title);
                chunks_written += chunks as u64;
                embeddings_written += embeddings as u64;
                embeddings_degraded += degraded as u64;
                processed += 1;
            }
            Err(e) => {
                eprintln!("Warning: skipping '{}': {e:#}", spec.title);
                failed += 1;
            }
        }
    }

    if dry_run {
        println!("ingest (dry-run)");
        println!("  documents: {processed}");
        println!("  estimated chunks: {estimated_chunks}");
    } else {
        println!("ingest");
        println!("  documents ingested: {processed}");
        println!("  chunks written: {chunks_written}");
        println!("  embeddings written: {embeddings_written}");
        if embeddings_degraded > 0 {
            println!("  embeddings degraded: {embeddings_degraded}");
        }
    }
    if skipped > 0 {
        println!("  unchanged: {skipped}");
    }
    if failed > 0 {
        println!("  failed: {failed}");
    }
    println!("ok");

    store.pool().close().await;
    Ok(())
}

enum DocOutcome {
    Unchanged,
    /// Dry run: the number of chunks ingestion would write.
    Estimated(usize),
    Ingested {
        chunks: usize,
        embeddings: usize,
        degraded: usize,
    },
}

/// The per-document pipeline. Any error here fails only this document;
/// the caller counts it and moves on.
async fn ingest_document(
    store: &VectorStore,
    embedder: Option<&Arc<dyn Embedder>>,
    config: &Config,
    chunk_opts: &ChunkOptions,
    spec: &DocumentSpec,
    dry_run: bool,
) -> Result<DocOutcome> {
    let raw = extract_file(&spec.file_path)?;
    let text = normalize_text(&raw);
    if text.is_empty() {
        anyhow::bail!("no text extracted");
    }

    let hash = dedup_hash(&text);
    if let Some(existing) = store.find_document_by_hash(&hash).await? {
        if store.document_has_embeddings(&existing).await? {
            return Ok(DocOutcome::Unchanged);
        }
        // A previous run died after writing this document's chunks but
        // before its embeddings; those chunks can never be retrieved.
        // Drop the partial rows and ingest the document again.
        if !dry_run {
            store.delete_document(&existing).await?;
        }
    }

    let chunks = match config.chunking.strategy.as_str() {
        "separator" => chunk_by_separator(&text, chunk_opts)?,
        _ => chunk_cascade(&text, chunk_opts)?,
    };

    if dry_run {
        return Ok(DocOutcome::Estimated(chunks.len()));
    }

    let document_id = store
        .insert_document(&NewDocument {
            title: spec.title.clone(),
            kind: spec.kind,
            version: spec.version.clone(),
            metadata: spec_metadata(spec),
            dedup_hash: hash,
        })
        .await?;

    let stored = persist_chunks(store, &document_id, spec, &chunks).await?;

    let mut embeddings = 0usize;
    let mut degraded = 0usize;
    if let Some(embedder) = embedder {
        let stagger = Duration::from_millis(config.embedding.stagger_ms);
        for batch in stored.chunks(config.embedding.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let result = embed_batch(Arc::clone(embedder), &texts, stagger).await;
            degraded += result.degraded;
            for (chunk, vector) in batch.iter().zip(result.vectors.iter()) {
                store.insert_embedding(&chunk.id, vector).await?;
                embeddings += 1;
            }
        }
    }

    Ok(DocOutcome::Ingested {
        chunks: stored.len(),
        embeddings,
        degraded,
    })
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let manifest: Manifest =
        toml::from_str(&content).with_context(|| "Failed to parse manifest")?;
    Ok(manifest)
}

/// sha256 of the normalized text, hex-encoded.
pub fn dedup_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn spec_metadata(spec: &DocumentSpec) -> serde_json::Value {
    serde_json::to_value(&spec.metadata).unwrap_or_else(|_| json!({}))
}

async fn persist_chunks(
    store: &VectorStore,
    document_id: &str,
    spec: &DocumentSpec,
    chunks: &[TextChunk],
) -> Result<Vec<StoredChunk>> {
    let mut stored = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let record = StoredChunk {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            chunk_index: chunk.index as i64,
            text: chunk.text.clone(),
            start_char: chunk.start_char as i64,
            end_char: chunk.end_char as i64,
            metadata: json!({
                "title": spec.title,
                "kind": spec.kind.as_str(),
            }),
        };
        store.insert_chunk(&record).await?;
        stored.push(record);
    }
    Ok(stored)
}
