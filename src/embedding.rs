//! Embedding generation and vector utilities.
//!
//! Defines the [`Embedder`] trait and its Gemini-backed implementation,
//! plus the batch driver used during ingestion:
//!
//! - [`embed_batch`] — fan out one request per text with a per-index
//!   launch stagger (the soft rate limit). A failed item degrades to an
//!   all-zero vector instead of failing the batch, so the i-th output
//!   always corresponds to the i-th input.
//! - [`vector_to_literal`] / [`literal_to_vector`] — the bracketed decimal
//!   text form vectors are stored in (`[0.1,0.2,...]`).
//! - [`cosine_similarity`] — similarity between two vectors of equal
//!   dimensionality; comparing mismatched lengths is an error, never a
//!   silent zero.
//!
//! Requires the `GEMINI_API_KEY` environment variable when the provider
//! is enabled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::config::EmbeddingConfig;
use crate::error::RagError;

/// An embedding backend: text in, fixed-dimensionality vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text. The returned vector has exactly [`dims`](Embedder::dims)
    /// components.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    fn dims(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Instantiate the configured embedding backend.
///
/// A disabled provider is a configuration error here: callers that reach
/// this point need real vectors.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, RagError> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config)?)),
        "disabled" => Err(RagError::Configuration(
            "embedding provider is disabled".to_string(),
        )),
        other => Err(RagError::Configuration(format!(
            "unknown embedding provider: '{other}'"
        ))),
    }
}

/// Embedding backend for the Gemini `embedContent` endpoint.
pub struct GeminiEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RagError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            RagError::Configuration("GEMINI_API_KEY environment variable not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Embedding(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:embedContent?key={}",
            self.model, self.api_key
        );

        let body = serde_json::json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Embedding(format!(
                "embedding API returned {status}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("invalid embedding response: {e}")))?;

        let values = json
            .get("embedding")
            .and_then(|e| e.get("values"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                RagError::Embedding("embedding response missing embedding.values".to_string())
            })?;

        let vector: Vec<f32> = values
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if vector.len() != self.dims {
            return Err(RagError::Embedding(format!(
                "expected {} dimensions, got {}",
                self.dims,
                vector.len()
            )));
        }

        Ok(vector)
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Result of [`embed_batch`]: one vector per input in input order, and the
/// number of inputs that degraded to a zero vector.
pub struct EmbedBatch {
    pub vectors: Vec<Vec<f32>>,
    pub degraded: usize,
}

/// Embed a batch of texts concurrently, launching the i-th request after
/// `i × stagger`. Failures never abort the batch: a failed item becomes an
/// all-zero vector and is counted in `degraded`.
pub async fn embed_batch(
    embedder: Arc<dyn Embedder>,
    texts: &[String],
    stagger: Duration,
) -> EmbedBatch {
    let dims = embedder.dims();
    let mut set = JoinSet::new();

    for (index, text) in texts.iter().enumerate() {
        let embedder = Arc::clone(&embedder);
        let text = text.clone();
        let delay = stagger * index as u32;
        set.spawn(async move {
            tokio::time::sleep(delay).await;
            (index, embedder.embed(&text).await)
        });
    }

    let mut vectors = vec![vec![0.0f32; dims]; texts.len()];
    let mut degraded = 0usize;

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(vector))) => {
                vectors[index] = vector;
            }
            Ok((index, Err(e))) => {
                eprintln!("Warning: embedding failed for item {index}: {e}");
                degraded += 1;
            }
            Err(e) => {
                eprintln!("Warning: embedding task panicked: {e}");
                degraded += 1;
            }
        }
    }

    EmbedBatch { vectors, degraded }
}

/// Encode a vector as its stored text form: `[0.1,0.2,0.3]`.
pub fn vector_to_literal(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 2);
    out.push('[');
    for (i, v) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

/// Decode the stored text form back into a vector. Anything malformed
/// (missing brackets, non-numeric components) decodes to an empty vector;
/// scans treat those rows as unmatchable rather than failing the query.
pub fn literal_to_vector(literal: &str) -> Vec<f32> {
    let Some(inner) = literal
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    else {
        return Vec::new();
    };

    if inner.trim().is_empty() {
        return Vec::new();
    }

    let mut vector = Vec::new();
    for part in inner.split(',') {
        match part.trim().parse::<f32>() {
            Ok(v) => vector.push(v),
            Err(_) => return Vec::new(),
        }
    }
    vector
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns `Ok(0.0)` when either vector has zero magnitude (the degraded
/// zero vector lands here, so it never ranks above a real match).
/// Mismatched lengths are an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, RagError> {
    if a.len() != b.len() {
        return Err(RagError::Embedding(format!(
            "vector length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return Ok(0.0);
    }

    Ok(dot / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEmbedder {
        dims: usize,
        fail_on: Vec<usize>,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            // Texts are "item-N"; fail the configured indices.
            let index: usize = text
                .rsplit('-')
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            if self.fail_on.contains(&index) {
                return Err(RagError::Embedding("stub failure".to_string()));
            }
            let mut v = vec![0.0; self.dims];
            v[index % self.dims] = 1.0;
            Ok(v)
        }

        fn dims(&self) -> usize {
            self.dims
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn batch_preserves_order_and_degrades_failures() {
        let embedder = Arc::new(StubEmbedder {
            dims: 4,
            fail_on: vec![1, 3],
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let texts: Vec<String> = (0..5).map(|i| format!("item-{i}")).collect();

        let batch = embed_batch(embedder.clone(), &texts, Duration::ZERO).await;

        assert_eq!(batch.vectors.len(), 5);
        assert_eq!(batch.degraded, 2);
        assert_eq!(
            embedder.calls.load(std::sync::atomic::Ordering::SeqCst),
            5
        );

        // Failed items are all-zero; successes carry their index marker.
        assert_eq!(batch.vectors[1], vec![0.0; 4]);
        assert_eq!(batch.vectors[3], vec![0.0; 4]);
        assert_eq!(batch.vectors[0][0], 1.0);
        assert_eq!(batch.vectors[2][2], 1.0);
        assert_eq!(batch.vectors[4][0], 1.0);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let embedder = Arc::new(StubEmbedder {
            dims: 4,
            fail_on: vec![],
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let batch = embed_batch(embedder, &[], Duration::ZERO).await;
        assert!(batch.vectors.is_empty());
        assert_eq!(batch.degraded, 0);
    }

    #[test]
    fn literal_roundtrip() {
        let v = vec![1.0f32, -2.5, 0.125, 0.0];
        assert_eq!(literal_to_vector(&vector_to_literal(&v)), v);
        assert_eq!(vector_to_literal(&[]), "[]");
        assert!(literal_to_vector("[]").is_empty());
    }

    #[test]
    fn malformed_literals_decode_to_empty() {
        assert!(literal_to_vector("").is_empty());
        assert!(literal_to_vector("0.1,0.2").is_empty());
        assert!(literal_to_vector("[0.1,abc]").is_empty());
        assert!(literal_to_vector("[0.1,0.2").is_empty());
    }

    #[test]
    fn cosine_identical_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_magnitude_is_zero() {
        let zero = vec![0.0; 3];
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&zero, &v).unwrap(), 0.0);
    }

    #[test]
    fn cosine_length_mismatch_is_an_error() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert!(matches!(
            cosine_similarity(&a, &b),
            Err(RagError::Embedding(_))
        ));
    }
}
