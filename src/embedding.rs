//! Embedding provider abstraction.
//!
//! Dispatches on `embedding.provider` from the config:
//! - **`disabled`** — ingestion still works; chunks are stored without
//!   vectors and search degrades to keyword scoring.
//! - **`gemini`** — Google Generative Language `batchEmbedContents`
//!   endpoint, keyed by `GEMINI_API_KEY`.
//! - **`openai`** — `POST /v1/embeddings`, keyed by `OPENAI_API_KEY`.
//!
//! Also provides vector utilities for the index:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `&[f32]` as little-endian bytes for BLOB storage
//! - [`blob_to_vec`] — decode a BLOB back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! HTTP 429 and 5xx responses and network errors retry with exponential
//! backoff (1s, 2s, 4s, … capped at 32s); other 4xx responses fail
//! immediately.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Environment variable holding the API key for a provider.
pub fn api_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        _ => None,
    }
}

/// Fetch the provider's API key, failing with a configuration error when it
/// is missing. Called at startup by commands that will need the key, so the
/// failure is fatal before any file work begins.
pub fn require_api_key(provider: &str) -> Result<String> {
    let var = api_key_var(provider)
        .ok_or_else(|| anyhow::anyhow!("Provider '{}' does not use an API key", provider))?;
    std::env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))
}

/// Embed a batch of texts using the configured provider.
///
/// Returns one vector per input text, in input order.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "gemini" => embed_gemini(config, texts).await,
        "openai" => embed_openai(config, texts).await,
        "disabled" => bail!("Embedding provider is disabled"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a single query text.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// POST a JSON body with the shared retry/backoff policy, returning the
/// parsed JSON of the first successful response.
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).header("Content-Type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        match request.json(body).send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!("{} error {}: {}", label, status, body_text));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("{} error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} failed after retries", label)))
}

async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key = require_api_key("openai")?;
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let json = post_json_with_retry(
        &client,
        "https://api.openai.com/v1/embeddings",
        &[("Authorization", format!("Bearer {}", api_key))],
        &body,
        config.max_retries,
        "OpenAI embeddings API",
    )
    .await?;

    parse_openai_response(&json)
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        embeddings.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(embeddings)
}

async fn embed_gemini(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key = require_api_key("gemini")?;
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let requests: Vec<serde_json::Value> = texts
        .iter()
        .map(|text| {
            serde_json::json!({
                "model": format!("models/{}", model),
                "content": { "parts": [{ "text": text }] },
            })
        })
        .collect();
    let body = serde_json::json!({ "requests": requests });

    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:batchEmbedContents",
        model
    );
    let json = post_json_with_retry(
        &client,
        &url,
        &[("x-goog-api-key", api_key)],
        &body,
        config.max_retries,
        "Gemini embeddings API",
    )
    .await?;

    parse_gemini_response(&json)
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("embeddings")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing embeddings array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let values = item
            .get("values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing values"))?;
        embeddings.push(
            values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(embeddings)
}

// ============ Vector utilities ============

/// Cosine similarity between two vectors; 0.0 on length mismatch or zero
/// magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Encode a vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vec.len() * 4);
    for value in vec {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode a BLOB produced by [`vec_to_blob`]. Trailing partial floats are
/// dropped.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
