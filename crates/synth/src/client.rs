//! HTTP chat client for OpenAI-compatible and Anthropic endpoints, with
//! retry and exponential backoff.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::oracle::{RepairRequest, SynthesisBundle, SynthesisOracle};
use crate::prompt;
use crate::OracleError;

/// Anthropic Messages API endpoint.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Required API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Base URL for OpenAI chat completions.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

/// Default maximum retries for transient errors.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds (doubles each retry).
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Default bound on one request, connection to last byte.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_TOKENS: u32 = 4096;

/// Environment variable checked before the provider-specific fallback.
pub const API_KEY_ENV: &str = "STEPSMITH_API_KEY";

// ── Provider ─────────────────────────────────────────────────────────────────

/// Wire protocol spoken by the oracle endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Any endpoint implementing OpenAI chat completions.
    OpenAi,
    Anthropic,
}

impl Provider {
    fn fallback_key_env(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => DEFAULT_OPENAI_MODEL,
            Provider::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }

    fn default_url(self) -> String {
        match self {
            Provider::OpenAi => format!("{}/chat/completions", OPENAI_BASE_URL),
            Provider::Anthropic => ANTHROPIC_API_URL.to_string(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        })
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(format!(
                "unknown provider '{}' (expected openai or anthropic)",
                other
            )),
        }
    }
}

// ── Configuration ────────────────────────────────────────────────────────────

/// Explicitly constructed client settings. Nothing is read from global
/// state after construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: Provider,
    pub model: String,
    /// Full endpoint URL. For OpenAI-compatible providers a base URL
    /// without `/chat/completions` is also accepted.
    pub url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ClientConfig {
    /// Settings with defaults for `provider` and an explicit key.
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        ClientConfig {
            provider,
            model: provider.default_model().to_string(),
            url: provider.default_url(),
            api_key: api_key.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Settings with the key read from `STEPSMITH_API_KEY`, falling back to
    /// the provider's own variable.
    pub fn from_env(provider: Provider) -> Result<Self, OracleError> {
        let fallback = provider.fallback_key_env();
        let key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(fallback).ok().filter(|k| !k.trim().is_empty()))
            .ok_or(OracleError::MissingApiKey { fallback })?;
        Ok(ClientConfig::new(provider, key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.url = match self.provider {
            Provider::OpenAi if !base.ends_with("/chat/completions") => {
                format!("{}/chat/completions", base)
            }
            _ => base.to_string(),
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ── Request / Response types ─────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Blocking chat client used as the production synthesis oracle.
pub struct ChatClient {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        ChatClient { config, agent }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send one system + user exchange and return the reply text.
    ///
    /// Retries on 429, 500, 502, 503 and transport failures with exponential
    /// backoff.
    pub fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        with_retry(|| self.complete_once(system, user), self.config.max_retries)
    }

    /// Make a single API call (no retry).
    fn complete_once(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let text = match self.config.provider {
            Provider::Anthropic => {
                let body = MessagesRequest {
                    model: &self.config.model,
                    max_tokens: MAX_TOKENS,
                    system,
                    messages: vec![Message {
                        role: "user",
                        content: user,
                    }],
                };
                let response = self
                    .agent
                    .post(&self.config.url)
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("content-type", "application/json")
                    .send_json(&body)
                    .map_err(classify)?;
                let resp: MessagesResponse = response
                    .into_body()
                    .read_json()
                    .map_err(|e| OracleError::Parse(e.to_string()))?;
                resp.content.into_iter().find_map(|block| block.text)
            }
            Provider::OpenAi => {
                let body = ChatRequest {
                    model: &self.config.model,
                    max_tokens: MAX_TOKENS,
                    temperature: 0.0,
                    messages: vec![
                        Message {
                            role: "system",
                            content: system,
                        },
                        Message {
                            role: "user",
                            content: user,
                        },
                    ],
                };
                let response = self
                    .agent
                    .post(&self.config.url)
                    .header("authorization", &format!("Bearer {}", self.config.api_key))
                    .header("content-type", "application/json")
                    .send_json(&body)
                    .map_err(classify)?;
                let resp: ChatResponse = response
                    .into_body()
                    .read_json()
                    .map_err(|e| OracleError::Parse(e.to_string()))?;
                resp.choices.into_iter().find_map(|c| c.message.content)
            }
        };

        text.filter(|t| !t.trim().is_empty())
            .ok_or(OracleError::EmptyResponse)
    }
}

impl SynthesisOracle for ChatClient {
    fn synthesize(&mut self, bundle: &SynthesisBundle) -> Result<String, OracleError> {
        let system = prompt::system_prompt(bundle.backend);
        let user = prompt::user_prompt(bundle);
        tracing::debug!(step = %bundle.step_text, model = %self.config.model, "requesting step body");
        self.complete(&system, &user)
    }

    fn repair(&mut self, request: &RepairRequest) -> Result<String, OracleError> {
        let system = prompt::repair_system_prompt(request.backend);
        let user = prompt::repair_prompt(request);
        tracing::debug!(attempt = request.attempt, backend = %request.backend, "requesting repair");
        self.complete(&system, &user)
    }
}

// ── Internal ─────────────────────────────────────────────────────────────────

fn classify(err: ureq::Error) -> OracleError {
    match err {
        ureq::Error::StatusCode(status) => OracleError::Status { status },
        ureq::Error::Timeout(kind) => OracleError::Timeout(kind.to_string()),
        ureq::Error::Io(e) => OracleError::Transport(e.to_string()),
        e @ (ureq::Error::HostNotFound | ureq::Error::ConnectionFailed) => {
            OracleError::Transport(e.to_string())
        }
        other => OracleError::Request(other.to_string()),
    }
}

/// Retry a fallible operation with exponential backoff.
///
/// Retries only errors for which [`OracleError::is_retryable`] holds.
/// Backoff starts at `INITIAL_BACKOFF_MS` and doubles each retry.
fn with_retry<T, F: Fn() -> Result<T, OracleError>>(f: F, max_retries: u32) -> Result<T, OracleError> {
    with_retry_sleeping(f, max_retries, std::thread::sleep)
}

fn with_retry_sleeping<T, F, S>(f: F, max_retries: u32, mut sleep: S) -> Result<T, OracleError>
where
    F: Fn() -> Result<T, OracleError>,
    S: FnMut(Duration),
{
    let mut backoff_ms = INITIAL_BACKOFF_MS;
    let mut attempt = 0;

    loop {
        match f() {
            Ok(val) => return Ok(val),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= max_retries => {
                return Err(OracleError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    of = max_retries + 1,
                    backoff_ms,
                    error = %e,
                    "retryable oracle error, backing off"
                );
                sleep(Duration::from_millis(backoff_ms));
                backoff_ms *= 2;
                attempt += 1;
            }
        }
    }
}
