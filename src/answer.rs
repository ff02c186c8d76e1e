//! Grounded answer assembly.
//!
//! Formats retrieved chunks into a context block, sends the grounding
//! prompt to the generation backend, and pairs the model's answer with one
//! citation per retrieved chunk. The prompt instructs the model to answer
//! only from the context and to fall back to a fixed "I don't know" line
//! rather than speculate; citations come from retrieval, never from the
//! model's output.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::RagError;
use crate::models::{Answer, Citation, RetrievedChunk};

const ANSWER_PROMPT: &str = "\
You are a student handbook assistant.
Answer user questions based ONLY on the provided context.

Rules:
- Be concise (2-3 sentences max).
- If unsure, say \"I don't know based on the handbook.\"
- Do not add extra commentary.
- Do not include citation markers or references in your response.

Context:
{context}

Question:
{question}

Answer:
";

/// Length of the citation snippet taken from the head of each chunk.
const SNIPPET_CHARS: usize = 200;

/// A text-generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RagError>;
}

pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>, RagError> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        "disabled" => Err(RagError::Configuration(
            "generation provider is disabled".to_string(),
        )),
        other => Err(RagError::Configuration(format!(
            "unknown generation provider: '{other}'"
        ))),
    }
}

/// Generation backend for the Gemini `generateContent` endpoint.
pub struct GeminiGenerator {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, RagError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            RagError::Configuration("GEMINI_API_KEY environment variable not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Generation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("generation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Generation(format!(
                "generation API returned {status}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::Generation(format!("invalid generation response: {e}")))?;

        let text = json
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.pointer("/content/parts/0/text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                RagError::Generation("generation response missing candidate text".to_string())
            })?;

        Ok(text.trim().to_string())
    }
}

/// Answer a question from already-retrieved chunks.
pub async fn answer_question(
    generator: &dyn Generator,
    question: &str,
    chunks: &[RetrievedChunk],
) -> Result<Answer, RagError> {
    let prompt = ANSWER_PROMPT
        .replace("{context}", &build_context(chunks))
        .replace("{question}", question);

    let answer = generator.generate(&prompt).await?;

    Ok(Answer {
        answer,
        citations: chunks.iter().map(citation_for).collect(),
    })
}

/// One context entry per chunk, labeled with its citation coordinate.
fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| {
            format!(
                "Document {}, chunk {}:\n{}",
                c.document_id, c.chunk_index, c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn citation_for(chunk: &RetrievedChunk) -> Citation {
    Citation {
        document_id: chunk.document_id.clone(),
        chunk_index: chunk.chunk_index,
        snippet: snippet(&chunk.text),
    }
}

/// Leading excerpt of the chunk, snapped back to a char boundary.
fn snippet(text: &str) -> String {
    if text.len() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let mut end = SNIPPET_CHARS;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
