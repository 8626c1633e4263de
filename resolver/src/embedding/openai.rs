use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Duration;

use super::provider::{EmbeddingProvider, EmbeddingPurpose};

const DEFAULT_MODEL: &str = "text-embedding-3-small";

pub struct OpenAiEmbeddingClient {
    http: Client,
    api_key: String,
    base: String,
    model: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(api_key: String, base: Option<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("client");
        Self {
            http,
            api_key,
            base: base.unwrap_or_else(|| "https://api.openai.com".into()),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(format!("{}/v1{}", self.base, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.model,
            "input": text,
            "user": purpose.as_str(),
        });

        let mut delay = Duration::from_millis(300);
        for attempt in 0..5 {
            let resp = self.post_json("/embeddings", &body).await?;
            if resp.status().is_success() {
                let parsed: EmbeddingResponse = resp
                    .json()
                    .await
                    .with_context(|| "Error from OpenAI embeddings api")?;
                let item = parsed
                    .data
                    .into_iter()
                    .next()
                    .context("Embedding response contained no data")?;
                return Ok(item.embedding);
            }

            if matches!(resp.status(), StatusCode::TOO_MANY_REQUESTS)
                || resp.status().is_server_error()
            {
                if attempt < 4 {
                    tokio::time::sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as f64 * 1.8) as u64)
                        + Duration::from_millis(fastrand::u64(0..250));
                    continue;
                }
            }

            let status = resp.status();
            let err_txt = resp
                .text()
                .await
                .with_context(|| "Error getting error text from OpenAI")
                .unwrap_or_default();
            anyhow::bail!("OpenAI error {}: {}", status, err_txt);
        }
        anyhow::bail!("Retries exhausted")
    }
}
