use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: String,
}

// Every prompt the server sends expects exactly one JSON object back. Handlers
// depend on this trait rather than on `LlmClient`, so tests swap in `MockChatModel`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Sends `prompt` and returns the single JSON object the model replied with.
    /// `schema_hint` is a short description of the expected shape.
    async fn complete_json(&self, prompt: &str, schema_hint: &str) -> Result<Value>;
}

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct LlmClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(client: Client, api_key: SecretString, base_url: String, model: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete_json(&self, prompt: &str, schema_hint: &str) -> Result<Value> {
        let system_message = format!(
            "You are a helpful interview coach. Always respond with a single valid JSON object and nothing else. The JSON schema is: {schema_hint}"
        );
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": system_message },
                { "role": "user", "content": prompt }
            ]
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Chat completion request failed")?
            .error_for_status()
            .context("Chat completion returned an error status")?
            .json::<LlmResponse>()
            .await
            .context("Failed to decode chat completion response")?;

        let answer = &resp
            .choices
            .first()
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?
            .message
            .content;
        tracing::debug!("LLM replied with {} chars", answer.len());
        parse_json_reply(answer)
    }
}

/// Parses a model reply as JSON. Models sometimes wrap the object in prose or
/// code fences, so on failure the text between the first `{` and the last `}`
/// is tried instead.
pub fn parse_json_reply(text: &str) -> Result<Value> {
    let text = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&text[start..=end])
            .map_err(|e| anyhow::anyhow!("Failed to parse LLM response: {e}")),
        _ => Err(anyhow::anyhow!("LLM response contained no JSON object")),
    }
}
