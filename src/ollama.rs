// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama API client for local AI inference

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::{FoldersmithError, Result};

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a client from the engine settings
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_url(&config.url),
            retries: config.retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                FoldersmithError::OllamaUnavailable(format!(
                    "Cannot connect to Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let tags: TagsResponse = self.client.get(&url).send().await?.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Check if a specific model is available
    pub async fn model_available(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| model_matches(m, model)))
    }

    /// Text completion, retried with exponential backoff
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        self.with_retry(|| self.send(model, prompt, None)).await
    }

    /// Vision completion over one base64-encoded image
    pub async fn generate_with_image(&self, model: &str, prompt: &str, image_base64: &str) -> Result<String> {
        self.with_retry(|| self.send(model, prompt, Some(image_base64))).await
    }

    async fn send(&self, model: &str, prompt: &str, image: Option<&str>) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            images: image.map(|i| vec![i]),
        };

        debug!("Sending request to Ollama: model={} vision={}", model, image.is_some());

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(FoldersmithError::OllamaUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let result: GenerateResponse = response.json().await?;
        Ok(result.response)
    }

    async fn with_retry<F, Fut>(&self, mut call: F) -> Result<String>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<String>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                let delay = Duration::from_secs(2u64.pow(attempt - 1));
                warn!("Retrying Ollama request in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match call().await {
                Ok(response) => return Ok(response),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| FoldersmithError::OllamaUnavailable("Unknown error".to_string())))
    }
}

/// Strip trailing slashes and endpoint paths users tend to paste in
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/')
        .replace("/api/generate", "")
        .replace("/api/chat", "")
}

/// `mistral` matches `mistral:latest`; an explicit tag must match exactly
fn model_matches(installed: &str, wanted: &str) -> bool {
    if wanted.contains(':') {
        installed == wanted
    } else {
        installed == wanted || installed.starts_with(&format!("{}:", wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_normalization() {
        assert_eq!(normalize_url("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(normalize_url("http://localhost:11434/api/generate"), "http://localhost:11434");
    }

    #[test]
    fn test_model_matching() {
        assert!(model_matches("mistral:latest", "mistral"));
        assert!(model_matches("mistral:latest", "mistral:latest"));
        assert!(!model_matches("mistral:7b", "mistral:latest"));
        assert!(!model_matches("mistral-nemo:latest", "mistral"));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_after_retries() {
        let config = EngineConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            retries: 0,
            ..EngineConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();
        assert!(client.generate("mistral", "hi").await.is_err());
        assert!(matches!(
            client.health_check().await,
            Err(FoldersmithError::OllamaUnavailable(_))
        ));
    }
}
