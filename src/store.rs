//! SQLite-backed vector store.
//!
//! Append-only persistence for documents, chunks, and embeddings, plus the
//! nearest-neighbor scan behind retrieval. Vectors are stored as bracketed
//! decimal literals and compared with an exact cosine scan in Rust; at the
//! corpus sizes this serves (one institution's handbooks) a linear scan is
//! well under query budget and has no index to drift out of sync.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{cosine_similarity, literal_to_vector, vector_to_literal};
use crate::error::RagError;
use crate::models::{NewDocument, RetrievedChunk, StoreStatus, StoredChunk};

pub struct VectorStore {
    pool: SqlitePool,
}

impl VectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a document row and return its generated id.
    pub async fn insert_document(&self, doc: &NewDocument) -> Result<String, RagError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, kind, version, metadata_json, dedup_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&doc.title)
        .bind(doc.kind.as_str())
        .bind(&doc.version)
        .bind(doc.metadata.to_string())
        .bind(&doc.dedup_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Look up a document by its content hash. Used to skip re-ingesting
    /// unchanged files.
    pub async fn find_document_by_hash(&self, dedup_hash: &str) -> Result<Option<String>, RagError> {
        let row = sqlx::query("SELECT id FROM documents WHERE dedup_hash = ? LIMIT 1")
            .bind(dedup_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    /// Whether any embedding rows exist for a document's chunks. A
    /// document found by hash but with no embeddings is a leftover from an
    /// interrupted ingest, not an unchanged one.
    pub async fn document_has_embeddings(&self, document_id: &str) -> Result<bool, RagError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM embeddings e
            JOIN chunks c ON c.id = e.chunk_id
            WHERE c.document_id = ?
            "#,
        )
        .bind(document_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Insert a chunk. Fails on an unknown document or a duplicate
    /// `(document_id, chunk_index)`.
    pub async fn insert_chunk(&self, chunk: &StoredChunk) -> Result<(), RagError> {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, document_id, chunk_index, text, start_char, end_char, metadata_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(chunk.start_char)
        .bind(chunk.end_char)
        .bind(chunk.metadata.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert an embedding for a chunk and return its generated id. Fails
    /// on an unknown chunk or a second embedding for the same chunk.
    pub async fn insert_embedding(
        &self,
        chunk_id: &str,
        vector: &[f32],
    ) -> Result<String, RagError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO embeddings (id, chunk_id, vector, dims, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(chunk_id)
        .bind(vector_to_literal(vector))
        .bind(vector.len() as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// The `k` chunks nearest to `query` by cosine distance
    /// (`1 - similarity`), ascending. Rows whose stored vector is
    /// malformed or of a different dimensionality are skipped; they can
    /// never be a nearest neighbor and must not poison the query.
    pub async fn top_k_by_distance(
        &self,
        query: &[f32],
        k: i64,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        if query.is_empty() {
            return Err(RagError::Retrieval("query vector is empty".to_string()));
        }
        if k < 1 {
            return Err(RagError::Retrieval(format!("k must be >= 1, got {k}")));
        }

        let rows = sqlx::query(
            r#"
            SELECT c.id AS chunk_id, c.document_id, c.chunk_index, c.text,
                   c.metadata_json, e.vector
            FROM embeddings e
            JOIN chunks c ON c.id = e.chunk_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<RetrievedChunk> = Vec::with_capacity(rows.len());
        for row in rows {
            let literal: String = row.get("vector");
            let vector = literal_to_vector(&literal);
            if vector.len() != query.len() {
                continue;
            }
            let similarity = cosine_similarity(query, &vector)?;
            let metadata_json: String = row.get("metadata_json");
            scored.push(RetrievedChunk {
                chunk_id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                metadata: serde_json::from_str(&metadata_json)
                    .unwrap_or(serde_json::Value::Null),
                distance: 1.0 - similarity,
            });
        }

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k as usize);
        Ok(scored)
    }

    /// Delete a document; chunks and embeddings go with it via FK cascade.
    /// Returns whether a row was actually deleted.
    pub async fn delete_document(&self, document_id: &str) -> Result<bool, RagError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn status(&self) -> Result<StoreStatus, RagError> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let embeddings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStatus {
            documents,
            chunks,
            embeddings,
        })
    }
}
