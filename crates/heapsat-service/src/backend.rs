//! OpenAI-compatible chat backend for the oracle seam.
//!
//! Configuration comes from the environment (the recommended path: keys
//! never live in config files), with per-request overrides for temperature
//! and token budget. The client is blocking on purpose: every call happens
//! on a worker thread, and the solve pipeline is strictly sequential.

use anyhow::{anyhow, Result};
use heapsat_solver::{Oracle, OracleError};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub(crate) const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub(crate) const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub(crate) const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";
pub(crate) const HEAPSAT_LLM_TIMEOUT_SECS_ENV: &str = "HEAPSAT_LLM_TIMEOUT_SECS";
pub(crate) const HEAPSAT_MAX_RETRIES_ENV: &str = "HEAPSAT_MAX_RETRIES";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
// Generous enough for local models while keeping stuck upstreams bounded.
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_MAX_TOKENS: u32 = 512;

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Option<Duration>,
}

impl BackendConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV)
            .unwrap_or_default()
            .trim()
            .to_string();
        if api_key.is_empty() {
            return Err(anyhow!(
                "solve backend requires {OPENAI_API_KEY_ENV} (set it in your env; do not hardcode secrets)"
            ));
        }
        let base_url = std::env::var(OPENAI_BASE_URL_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let model = std::env::var(OPENAI_MODEL_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key,
            base_url,
            model,
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: llm_timeout()?,
        })
    }

    pub fn override_temperature(mut self, temperature: Option<f32>) -> Self {
        if let Some(temperature) = temperature {
            self.temperature = temperature;
        }
        self
    }

    pub fn override_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        if let Some(max_tokens) = max_tokens {
            self.max_tokens = max_tokens;
        }
        self
    }
}

/// Resolve the per-call timeout. `0` disables it.
fn llm_timeout() -> Result<Option<Duration>> {
    match std::env::var(HEAPSAT_LLM_TIMEOUT_SECS_ENV) {
        Ok(v) => {
            let v = v.trim();
            if v.is_empty() {
                return Ok(Some(Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS)));
            }
            let secs = v.parse::<u64>().map_err(|_| {
                anyhow!(
                    "invalid {HEAPSAT_LLM_TIMEOUT_SECS_ENV}={v:?} (expected integer seconds, 0 to disable)"
                )
            })?;
            Ok((secs > 0).then(|| Duration::from_secs(secs)))
        }
        Err(std::env::VarError::NotPresent) => {
            Ok(Some(Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS)))
        }
        Err(e) => Err(anyhow!("failed to read {HEAPSAT_LLM_TIMEOUT_SECS_ENV}: {e}")),
    }
}

/// Resolve the default refiner budget.
///
/// Precedence:
/// 1) env var `HEAPSAT_MAX_RETRIES`
/// 2) default (`2`, i.e. up to 3 attempts per solve)
pub(crate) fn default_max_retries() -> Result<u32> {
    match std::env::var(HEAPSAT_MAX_RETRIES_ENV) {
        Ok(v) => {
            let v = v.trim();
            if v.is_empty() {
                return Ok(DEFAULT_MAX_RETRIES);
            }
            v.parse::<u32>().map_err(|_| {
                anyhow!("invalid {HEAPSAT_MAX_RETRIES_ENV}={v:?} (expected integer refiner budget)")
            })
        }
        Err(std::env::VarError::NotPresent) => Ok(DEFAULT_MAX_RETRIES),
        Err(e) => Err(anyhow!("failed to read {HEAPSAT_MAX_RETRIES_ENV}: {e}")),
    }
}

pub struct ChatBackend {
    config: BackendConfig,
    client: reqwest::blocking::Client,
}

impl ChatBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| anyhow!("failed to build http client: {e}"))?;
        Ok(Self { config, client })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl Oracle for ChatBackend {
    fn invoke(&self, system: &str, human: &str) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": human }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| OracleError::Network(format!("failed to reach {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(OracleError::Api(format!(
                "chat endpoint returned {status}: {text}"
            )));
        }

        let out: ChatCompletionResponse = resp.json().map_err(|e| {
            OracleError::InvalidResponse(format!("chat endpoint returned invalid JSON: {e}"))
        })?;
        out.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OracleError::InvalidResponse("chat endpoint returned no choices".to_string()))
    }
}
