// src/providers/ollama.rs

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::OllamaConfig;
use crate::errors::Result;
use crate::providers::{non_empty_reply, send_json, LlmProvider, GENERATION_TEMPERATURE};

/// Program generation through a local Ollama server's `/api/generate` endpoint.
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

impl OllamaProvider {
    pub fn new(client: Client, config: OllamaConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.api_base.trim_end_matches('/'))
    }
}

impl LlmProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: &str) -> Result<(String, u64)> {
        let url = self.endpoint();
        log::info!("Calling Ollama {} with model {}", url, model);

        // One complete reply; streamed chunks would need reassembly.
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: GENERATION_TEMPERATURE,
            },
        };

        let (reply, latency_ms): (GenerateResponse, u64) =
            send_json("Ollama", self.client.post(&url).json(&body)).await?;
        Ok((non_empty_reply(reply.response)?, latency_ms))
    }
}
