// src/generator.rs
use regex::Regex;
use std::sync::LazyLock;

use crate::config::{AppConfig, OpenAIConfig};
use crate::errors::{JudgeError, Result};
use crate::providers::{ollama::OllamaProvider, openai::OpenAIProvider, LlmProvider};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:javascript|js|jsx|typescript|ts)?[ \t]*\r?\n(.*?)```").unwrap()
});

#[derive(Debug, Clone, serde::Serialize)]
pub struct GeneratedProgram {
    pub code: String,
    pub model: String,
    pub latency_ms: u64,
}

/// Wraps the user's request in instructions for a single `solution` function.
pub fn create_generation_prompt(prompt: &str) -> String {
    format!(
        r#"You write small, self-contained JavaScript programs.

TASK:
{}

RULES:
1. Define exactly one function named `solution` that takes the inputs as positional arguments and returns the result.
2. Do not read input, print results, or call the function yourself.
3. Use only standard ECMAScript built-ins; there is no network, file system, timers or `require`.
4. Reply with a single ```javascript code block and nothing else."#,
        prompt.trim()
    )
}

/// First fenced code block in the reply, or the whole reply when it has none.
pub fn extract_code(reply: &str) -> Option<String> {
    let code = match CODE_FENCE.captures(reply) {
        Some(caps) => caps[1].trim().to_string(),
        None => reply.trim().to_string(),
    };
    (!code.is_empty()).then_some(code)
}

/// Parses "provider:model_name". Defaults to "openai" if no provider is specified.
fn parse_model_string(model_str: &str) -> (String, String) {
    match model_str.split_once(':') {
        Some((provider, model)) => (provider.to_string(), model.to_string()),
        None => ("openai".to_string(), model_str.to_string()),
    }
}

async fn call_provider(
    config: &AppConfig,
    client: &reqwest::Client,
    provider_name: &str,
    model_name: &str,
    prompt: &str,
    api_key: Option<&str>,
) -> Result<(String, u64)> {
    match provider_name {
        "openai" => {
            let openai_config = match (config.openai.as_ref(), api_key) {
                (Some(base), Some(key)) => OpenAIConfig {
                    api_key: key.to_string(),
                    ..base.clone()
                },
                (Some(base), None) => base.clone(),
                (None, Some(key)) => OpenAIConfig {
                    api_base: "https://api.openai.com/v1".to_string(),
                    api_key: key.to_string(),
                    models: Vec::new(),
                },
                (None, None) => return Err(JudgeError::ProviderNotFound("openai".to_string())),
            };
            let provider = OpenAIProvider::new(client.clone(), openai_config);
            provider.generate(model_name, prompt).await
        }
        "ollama" => {
            let ollama_config = config
                .ollama
                .as_ref()
                .ok_or_else(|| JudgeError::ProviderNotFound("ollama".to_string()))?;
            let provider = OllamaProvider::new(client.clone(), ollama_config.clone());
            provider.generate(model_name, prompt).await
        }
        _ => Err(JudgeError::ProviderNotFound(provider_name.to_string())),
    }
}

/// Turns a natural-language prompt into program text using the configured providers.
///
/// `model` falls back to the first configured model; `api_key` overrides the configured
/// OpenAI key for this call only.
pub async fn generate_program(
    config: &AppConfig,
    client: &reqwest::Client,
    prompt: &str,
    model: Option<&str>,
    api_key: Option<&str>,
) -> Result<GeneratedProgram> {
    if prompt.trim().is_empty() {
        return Err(JudgeError::Config("prompt must not be empty".to_string()));
    }

    let model = match model.filter(|m| !m.trim().is_empty()) {
        Some(model) => model.to_string(),
        None => config
            .models
            .first()
            .cloned()
            .or_else(|| api_key.map(|_| "openai:gpt-4o-mini".to_string()))
            .ok_or_else(|| JudgeError::Config("no generation model configured".to_string()))?,
    };

    let (provider_name, model_name) = parse_model_string(&model);
    let (reply, latency_ms) = call_provider(
        config,
        client,
        &provider_name,
        &model_name,
        &create_generation_prompt(prompt),
        api_key,
    )
    .await?;

    let code = extract_code(&reply).ok_or(JudgeError::EmptyResponse)?;
    log::info!("Generated {} bytes of program text with {} ({}ms)", code.len(), model, latency_ms);

    Ok(GeneratedProgram {
        code,
        model,
        latency_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use actix_web::{web, App, HttpResponse, HttpServer};
    use serde_json::json;

    #[test]
    fn test_extract_code_prefers_fenced_block() {
        let reply = "Here you go:\n```javascript\nfunction solution(n) {\n  return n * 2;\n}\n```\nEnjoy!";
        assert_eq!(
            extract_code(reply).as_deref(),
            Some("function solution(n) {\n  return n * 2;\n}")
        );

        let bare = "```\nfunction solution(){ return 1; }\n```";
        assert_eq!(extract_code(bare).as_deref(), Some("function solution(){ return 1; }"));
    }

    #[test]
    fn test_extract_code_without_fence_uses_whole_reply() {
        assert_eq!(
            extract_code("  function solution(){ return 1; }  ").as_deref(),
            Some("function solution(){ return 1; }")
        );
        assert_eq!(extract_code("   "), None);
        assert_eq!(extract_code("```js\n\n```"), None);
    }

    #[test]
    fn test_parse_model_string() {
        assert_eq!(parse_model_string("ollama:llama3"), ("ollama".into(), "llama3".into()));
        assert_eq!(parse_model_string("gpt-4o"), ("openai".into(), "gpt-4o".into()));
    }

    #[test]
    fn test_generation_prompt_mentions_entry_point() {
        let prompt = create_generation_prompt("  reverse a string ");
        assert!(prompt.contains("reverse a string"));
        assert!(prompt.contains("`solution`"));
    }

    fn config_for(api_base: &str) -> AppConfig {
        let base = api_base.to_string();
        AppConfig::from_parts(FileConfig::default(), move |key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "OPENAI_API_BASE" => Some(base.clone()),
            "OPENAI_MODELS" => Some("mock-model".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[actix_rt::test]
    async fn test_generate_program_against_mock_endpoint() {
        let server = HttpServer::new(|| {
            App::new().route(
                "/v1/chat/completions",
                web::post().to(|body: web::Json<serde_json::Value>| async move {
                    let model = body["model"].as_str().unwrap_or_default().to_string();
                    HttpResponse::Ok().json(json!({
                        "choices": [{
                            "message": {
                                "content": format!("```js\n// {}\nfunction solution(a, b) {{ return a + b; }}\n```", model)
                            }
                        }]
                    }))
                }),
            )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        let handle = server.run();
        actix_rt::spawn(handle);

        let config = config_for(&format!("http://{}/v1", addr));
        let client = reqwest::Client::new();
        let generated = generate_program(&config, &client, "add two numbers", None, None)
            .await
            .unwrap();

        assert_eq!(generated.model, "openai:mock-model");
        assert_eq!(
            generated.code,
            "// mock-model\nfunction solution(a, b) { return a + b; }"
        );
    }

    #[actix_rt::test]
    async fn test_upstream_error_status_is_reported() {
        let server = HttpServer::new(|| {
            App::new().route(
                "/v1/chat/completions",
                web::post().to(|| async { HttpResponse::Unauthorized().body("bad key") }),
            )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_rt::spawn(server.run());

        let config = config_for(&format!("http://{}/v1", addr));
        let err = generate_program(&config, &reqwest::Client::new(), "anything", None, Some("sk-other"))
            .await
            .unwrap_err();

        match err {
            JudgeError::ApiError { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_provider_and_empty_prompt() {
        let config = AppConfig::from_parts(FileConfig::default(), |_| None).unwrap();
        let client = reqwest::Client::new();

        let err = generate_program(&config, &client, "x", Some("gemini:pro"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::ProviderNotFound(p) if p == "gemini"));

        let err = generate_program(&config, &client, "   ", None, None).await.unwrap_err();
        assert!(matches!(err, JudgeError::Config(_)));

        let err = generate_program(&config, &client, "x", None, None).await.unwrap_err();
        assert!(matches!(err, JudgeError::Config(_)));
    }
}
