// src/providers/openai.rs

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::OpenAIConfig;
use crate::errors::{JudgeError, Result};
use crate::providers::{non_empty_reply, send_json, LlmProvider, GENERATION_TEMPERATURE};

/// A provider for OpenAI-compatible chat completion endpoints.
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIProvider {
    pub fn new(client: Client, config: OpenAIConfig) -> Self {
        Self { client, config }
    }
}

impl LlmProvider for OpenAIProvider {
    async fn generate(&self, model: &str, prompt: &str) -> Result<(String, u64)> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));

        log::info!("Calling OpenAI-compatible endpoint {} with model {}", url, model);

        let body = ChatRequest {
            model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: GENERATION_TEMPERATURE,
        };

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body);
        let (chat, latency_ms): (ChatResponse, u64) = send_json("OpenAI", request).await?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| JudgeError::UnexpectedResponse("No choices in response".to_string()))?
            .message
            .content;

        Ok((non_empty_reply(content)?, latency_ms))
    }
}
