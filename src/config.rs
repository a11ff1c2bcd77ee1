// src/config.rs
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{JudgeError, Result};
use crate::sandbox::SandboxLimits;
use crate::worker::{Isolation, SandboxWorker};

/// Configuration for an OpenAI-compatible provider.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_base: String,
    pub api_key: String,
    pub models: Vec<String>,
}

/// Configuration for the Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub api_base: String,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    pub isolation: Isolation,
    pub timeout_ms: u64,
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
    /// Binary spawned for process isolation. Defaults to the running executable.
    pub worker_program: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let limits = SandboxLimits::default();
        Self {
            isolation: Isolation::Process,
            timeout_ms: 5_000,
            loop_iteration_limit: limits.loop_iteration_limit,
            recursion_limit: limits.recursion_limit,
            worker_program: None,
        }
    }
}

impl SandboxConfig {
    pub fn limits(&self) -> SandboxLimits {
        SandboxLimits {
            loop_iteration_limit: self.loop_iteration_limit,
            recursion_limit: self.recursion_limit,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn build_worker(&self) -> Result<SandboxWorker> {
        let program = match &self.worker_program {
            Some(path) => path.clone(),
            None if self.isolation == Isolation::Process => std::env::current_exe()?,
            None => PathBuf::new(),
        };
        Ok(SandboxWorker::new(self.isolation, self.limits(), self.timeout(), program))
    }
}

/// Shape of the optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub sandbox: SandboxConfig,
    pub database_url: Option<String>,
    /// Store the workspace at the default data location when no `database_url` is given.
    pub persist: bool,
}

impl FileConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

/// High-level application configuration: config file first, then environment overrides.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sandbox: SandboxConfig,
    pub database_url: Option<String>,
    pub openai: Option<OpenAIConfig>,
    pub ollama: Option<OllamaConfig>,
    pub models: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {}", e);
        }

        let file = match config_file_path() {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                FileConfig::read(&path)?
            }
            None => FileConfig::default(),
        };

        Self::from_parts(file, |key| std::env::var(key).ok())
    }

    /// Applies environment overrides (looked up through `env`) on top of a file config.
    pub fn from_parts<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut server = file.server;
        let mut sandbox = file.sandbox;

        if let Some(host) = env("JSJUDGE_HOST") {
            server.host = host;
        }
        if let Some(port) = env("JSJUDGE_PORT") {
            server.port = port
                .parse()
                .map_err(|_| JudgeError::Config(format!("JSJUDGE_PORT is not a port: {}", port)))?;
        }
        if let Some(isolation) = env("JSJUDGE_ISOLATION") {
            sandbox.isolation = isolation.parse()?;
        }
        if let Some(timeout) = env("JSJUDGE_TIMEOUT_MS") {
            sandbox.timeout_ms = timeout.parse().map_err(|_| {
                JudgeError::Config(format!("JSJUDGE_TIMEOUT_MS is not a number: {}", timeout))
            })?;
        }
        if sandbox.timeout_ms == 0 {
            return Err(JudgeError::Config("sandbox timeout must be greater than zero".to_string()));
        }

        let persist = match env("JSJUDGE_PERSIST") {
            Some(flag) => matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            None => file.persist,
        };
        let database_url = env("DATABASE_URL")
            .or(file.database_url)
            .or_else(|| if persist { default_database_url() } else { None });

        let mut all_models = Vec::new();

        let mut openai_config = None;
        if let Some(api_key) = env("OPENAI_API_KEY") {
            let api_base = env("OPENAI_API_BASE").unwrap_or_else(|| "https://api.openai.com/v1".to_string());
            let models = split_models(&env("OPENAI_MODELS").unwrap_or_else(|| "gpt-4o-mini".to_string()));
            all_models.extend(models.iter().map(|m| format!("openai:{}", m)));
            openai_config = Some(OpenAIConfig { api_base, api_key, models });
        }

        let mut ollama_config = None;
        if let Some(api_base) = env("OLLAMA_API_BASE") {
            let models = split_models(&env("OLLAMA_MODELS").unwrap_or_else(|| "qwen2.5-coder".to_string()));
            all_models.extend(models.iter().map(|m| format!("ollama:{}", m)));
            ollama_config = Some(OllamaConfig { api_base, models });
        }

        if openai_config.is_none() && ollama_config.is_none() {
            log::warn!("No code generation provider configured; set OPENAI_API_KEY or OLLAMA_API_BASE to enable it");
        }

        Ok(AppConfig {
            server,
            sandbox,
            database_url,
            openai: openai_config,
            ollama: ollama_config,
            models: all_models,
        })
    }
}

fn split_models(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `JSJUDGE_CONFIG` if set, else `<config dir>/jsjudge/config.toml` when it exists.
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("JSJUDGE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let default = dirs::config_dir()?.join("jsjudge").join("config.toml");
    default.exists().then_some(default)
}

/// Default on-disk location for the workspace database.
pub fn default_database_url() -> Option<String> {
    let dir = dirs::data_dir()?.join("jsjudge");
    Some(format!("sqlite:{}", dir.join("jsjudge.db").display()))
}
