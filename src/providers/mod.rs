// src/providers/mod.rs

use serde::de::DeserializeOwned;
use std::time::Instant;

use crate::errors::{JudgeError, Result};

pub mod ollama;
pub mod openai;

/// Low temperature keeps generated programs close to the requested behavior.
pub(crate) const GENERATION_TEMPERATURE: f32 = 0.2;

/// A common trait for the LLM backends that turn a prompt into program text.
///
/// Implementers use native `async fn`; there is no boxing, so dispatch happens by
/// provider name in [`crate::generator`].
pub trait LlmProvider: Send + Sync {
    /// Sends `prompt` to `model` and returns the reply text and the latency in milliseconds.
    fn generate(&self, model: &str, prompt: &str) -> impl std::future::Future<Output = Result<(String, u64)>> + Send;
}

/// Sends a prepared request and decodes a successful JSON body, timing the round trip.
///
/// Non-2xx statuses become [`JudgeError::ApiError`] carrying the upstream body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<(T, u64)> {
    let start = Instant::now();
    let resp = request.send().await?;

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    log::debug!("{} response status: {} ({}ms)", provider, status, latency_ms);

    if !status.is_success() {
        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error body".to_string());
        return Err(JudgeError::ApiError {
            status: status.as_u16(),
            body,
        });
    }

    Ok((resp.json().await?, latency_ms))
}

/// The reply text, unless the model answered with nothing but whitespace.
pub(crate) fn non_empty_reply(reply: Option<String>) -> Result<String> {
    match reply {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(JudgeError::EmptyResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_replies_are_empty_responses() {
        assert!(matches!(non_empty_reply(None), Err(JudgeError::EmptyResponse)));
        assert!(matches!(non_empty_reply(Some(" \n".into())), Err(JudgeError::EmptyResponse)));
        assert_eq!(non_empty_reply(Some("x".into())).unwrap(), "x");
    }
}
