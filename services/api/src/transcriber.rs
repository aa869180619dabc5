use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TranscriptionOut {
    text: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes one uploaded audio file. An empty string means no speech was detected.
    async fn transcribe(&self, audio: Vec<u8>, file_name: String) -> Result<String>;
}

/// Client for an OpenAI-compatible `audio/transcriptions` endpoint.
pub struct SttClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl SttClient {
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
impl Transcriber for SttClient {
    async fn transcribe(&self, audio: Vec<u8>, file_name: String) -> Result<String> {
        let size = audio.len();
        let part = reqwest::multipart::Part::bytes(audio).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?
            .error_for_status()
            .context("Transcription returned an error status")?
            .json::<TranscriptionOut>()
            .await
            .context("Failed to decode transcription response")?;

        let text = resp.text.trim().to_string();
        tracing::debug!("Transcribed {} bytes into {} chars", size, text.len());
        Ok(text)
    }
}
