//! Retrieval-augmented answering.
//!
//! `atlas ask` embeds the question (when a provider is configured), pulls
//! the top matching chunks from the index, and asks a chat model to answer
//! grounded in those chunks. The chat provider is independent of the
//! embedding provider; both share the same retry policy.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::Config;
use crate::embedding::{post_json_with_retry, require_api_key};
use crate::index::sqlite::SqliteIndex;
use crate::models::ScoredChunk;
use crate::query;

const CHAT_MAX_RETRIES: u32 = 3;

/// `atlas ask <question>` — answer a question from the indexed documents.
pub async fn run_ask(config: &Config, question: &str, limit: Option<usize>) -> Result<()> {
    // Missing credentials are fatal before any retrieval work.
    let api_key = require_api_key(&config.chat.provider)?;
    if config.embedding.is_enabled() {
        require_api_key(&config.embedding.provider)?;
    }

    let index = SqliteIndex::connect(&config.index.path).await?;
    let k = limit.unwrap_or(config.chat.context_chunks);
    let hits = query::retrieve(config, &index, question, k).await?;

    if hits.is_empty() {
        println!("No indexed content matched the question.");
        index.close().await;
        return Ok(());
    }

    let prompt = build_prompt(question, &hits);
    let answer = match config.chat.provider.as_str() {
        "gemini" => ask_gemini(config, &api_key, &prompt).await?,
        "openai" => ask_openai(config, &api_key, &prompt).await?,
        other => bail!("Unknown chat provider: {}", other),
    };

    println!("{}", answer.trim());
    println!();
    println!("sources:");
    let mut seen_sources: Vec<&str> = Vec::new();
    for hit in &hits {
        if !seen_sources.contains(&hit.source.as_str()) {
            seen_sources.push(&hit.source);
            println!("  {}", hit.source);
        }
    }

    index.close().await;
    Ok(())
}

/// Assemble a grounded prompt: the retrieved chunks as numbered context
/// sections, then the question.
fn build_prompt(question: &str, hits: &[ScoredChunk]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the document excerpts below. \
         If the excerpts do not contain the answer, say so.\n\n",
    );
    for (i, hit) in hits.iter().enumerate() {
        prompt.push_str(&format!("[{}] (from {})\n{}\n\n", i + 1, hit.source, hit.body));
    }
    prompt.push_str(&format!("Question: {}\n", question));
    prompt
}

async fn ask_gemini(config: &Config, api_key: &str, prompt: &str) -> Result<String> {
    let model = config.chat.model.as_deref().unwrap_or("gemini-2.0-flash");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.chat.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
    });
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
        model
    );

    let json = post_json_with_retry(
        &client,
        &url,
        &[("x-goog-api-key", api_key.to_string())],
        &body,
        CHAT_MAX_RETRIES,
        "Gemini API",
    )
    .await?;

    parse_gemini_answer(&json)
}

fn parse_gemini_answer(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidates"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        bail!("Gemini response contained no text");
    }
    Ok(text)
}

async fn ask_openai(config: &Config, api_key: &str, prompt: &str) -> Result<String> {
    let model = config.chat.model.as_deref().unwrap_or("gpt-4o-mini");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.chat.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
    });

    let json = post_json_with_retry(
        &client,
        "https://api.openai.com/v1/chat/completions",
        &[("Authorization", format!("Bearer {}", api_key))],
        &body,
        CHAT_MAX_RETRIES,
        "OpenAI chat API",
    )
    .await?;

    parse_openai_answer(&json)
}

fn parse_openai_answer(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}
