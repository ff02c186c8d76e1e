//! Error taxonomy for the ingestion and retrieval pipeline.
//!
//! Each variant maps to one failure domain with its own propagation rule:
//!
//! | Variant | When | Propagation |
//! |---------|------|-------------|
//! | [`Configuration`](RagError::Configuration) | invalid config (e.g. `chunk_size <= chunk_overlap`) | fatal, before any work |
//! | [`Extraction`](RagError::Extraction) | file-to-text collaborator failed | per document, batch continues |
//! | [`Embedding`](RagError::Embedding) | embedding call failed or returned a bad vector | ingest: degraded to a zero vector; query: fatal |
//! | [`Storage`](RagError::Storage) | insert integrity violation or database failure | fatal to the operation |
//! | [`Retrieval`](RagError::Retrieval) | store unavailable or malformed query vector | fatal to the query |
//! | [`Generation`](RagError::Generation) | answer generation failed | fatal to the query; users see a generic message |

use thiserror::Error;

/// Pipeline error. CLI plumbing wraps this in `anyhow`; the HTTP layer maps
/// variants to status codes and never exposes raw provider text.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("generation failed: {0}")]
    Generation(String),
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        RagError::Storage(err.to_string())
    }
}
