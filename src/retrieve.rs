//! Query-time retrieval: embed the question, then nearest-neighbor scan.
//!
//! Unlike ingestion, a query-time embedding failure is fatal — there is no
//! meaningful degraded answer to a question that could not be embedded.

use crate::embedding::Embedder;
use crate::error::RagError;
use crate::models::RetrievedChunk;
use crate::store::VectorStore;

/// The `k` most relevant chunks for a question, closest first.
pub async fn retrieve_top_k(
    embedder: &dyn Embedder,
    store: &VectorStore,
    question: &str,
    k: i64,
) -> Result<Vec<RetrievedChunk>, RagError> {
    if question.trim().is_empty() {
        return Err(RagError::Retrieval("question is empty".to_string()));
    }

    let query = embedder.embed(question).await?;
    store.top_k_by_distance(&query, k).await
}
