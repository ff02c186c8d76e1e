//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through ingestion and query handling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Category of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Handbook,
    Rulebook,
    Policy,
    Guide,
    Other,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Handbook => "handbook",
            DocumentKind::Rulebook => "rulebook",
            DocumentKind::Policy => "policy",
            DocumentKind::Guide => "guide",
            DocumentKind::Other => "other",
        }
    }
}

/// A document record ready for insertion. Immutable after creation except
/// for its metadata.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub kind: DocumentKind,
    pub version: Option<String>,
    pub metadata: serde_json::Value,
    /// sha256 of the normalized text, used to skip re-ingesting an
    /// unchanged document.
    pub dedup_hash: String,
}

/// A chunk as persisted: the retrieval unit.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub start_char: i64,
    pub end_char: i64,
    pub metadata: serde_json::Value,
}

/// A chunk returned from a nearest-neighbor query, carrying its cosine
/// distance to the query vector. Transient; never persisted.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub metadata: serde_json::Value,
    /// `1 - cosine_similarity`; lower is more relevant. Passed through
    /// from the store as-is.
    pub distance: f32,
}

/// One source reference attached to an answer. Serialized in camelCase
/// for the HTTP API (`documentId`, `chunkIndex`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub document_id: String,
    pub chunk_index: i64,
    /// Leading excerpt of the chunk text (200 characters).
    pub snippet: String,
}

/// A grounded answer with its supporting citations, in relevance order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// One entry of an ingestion manifest (`[[documents]]` in the manifest TOML).
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSpec {
    pub file_path: PathBuf,
    pub title: String,
    pub kind: DocumentKind,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, toml::Value>,
}

/// Ingestion manifest: the list of documents to process in one run.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub documents: Vec<DocumentSpec>,
}

/// Row counts reported by `hbq status` and `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub documents: i64,
    pub chunks: i64,
    pub embeddings: i64,
}
