//! Provider variants behind a single completion contract.
//!
//! Every backend implements [`CompletionClient`]. The set of backends is
//! closed, so the configured one is held as a [`Provider`] enum and chosen
//! once per run from [`ProviderSettings`].

pub mod anthropic;
pub mod gemini;
pub mod local;
pub mod openai;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use local::LocalProvider;
pub use openai::OpenAiClient;

/// Boxed future returned by [`CompletionClient::complete`].
pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<Completion>> + Send + 'a>>;

/// Text returned by a provider together with its token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A backend able to complete a prompt.
///
/// Implementations must report transport-level problems as
/// [`ProviderError::Transport`] and explicit rejections as
/// [`ProviderError::Fatal`]; the orchestrator retries only the former.
pub trait CompletionClient: Send + Sync {
    /// Provider identifier recorded in usage records.
    fn name(&self) -> &str;

    /// Model identifier recorded in usage records.
    fn model(&self) -> &str;

    fn complete<'a>(&'a self, prompt: &'a str, max_output_tokens: u32) -> CompletionFuture<'a>;
}

/// Which backend to use for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Local,
    Anthropic,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Environment variable holding the API key, if the provider needs one.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Local => None,
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local-summary",
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ProviderKind::Local),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(format!(
                "unknown provider '{}' (expected local, anthropic, openai or gemini)",
                other
            )),
        }
    }
}

/// Everything needed to construct a provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: Option<String>,
    pub temperature: f32,
    /// Overrides the provider's base URL.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: None,
            temperature: 0.1,
            endpoint: None,
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Fill the API key from the provider's environment variable.
    pub fn with_env_api_key(mut self) -> Self {
        if let Some(var) = self.kind.api_key_var() {
            self.api_key = std::env::var(var).ok().filter(|k| !k.trim().is_empty());
        }
        self
    }

    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.kind.default_model().to_string())
    }

    fn require_api_key(&self) -> Result<String> {
        match (&self.api_key, self.kind.api_key_var()) {
            (Some(key), _) => Ok(key.clone()),
            (None, Some(var)) => Err(ProviderError::NotConfigured {
                provider: self.kind.to_string(),
                missing: var.to_string(),
            }),
            (None, None) => Ok(String::new()),
        }
    }
}

/// The configured backend for a run.
pub enum Provider {
    Anthropic(AnthropicClient),
    OpenAi(OpenAiClient),
    Gemini(GeminiClient),
    Local(LocalProvider),
}

impl Provider {
    /// Build the provider named by `settings`.
    ///
    /// Cloud providers fail with [`ProviderError::NotConfigured`] when their
    /// API key is missing.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let provider = match settings.kind {
            ProviderKind::Local => Provider::Local(LocalProvider::new(settings.model_name())),
            ProviderKind::Anthropic => {
                Provider::Anthropic(AnthropicClient::new(settings, settings.require_api_key()?)?)
            }
            ProviderKind::OpenAi => {
                Provider::OpenAi(OpenAiClient::new(settings, settings.require_api_key()?)?)
            }
            ProviderKind::Gemini => {
                Provider::Gemini(GeminiClient::new(settings, settings.require_api_key()?)?)
            }
        };
        Ok(provider)
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Anthropic(_) => ProviderKind::Anthropic,
            Provider::OpenAi(_) => ProviderKind::OpenAi,
            Provider::Gemini(_) => ProviderKind::Gemini,
            Provider::Local(_) => ProviderKind::Local,
        }
    }

    fn client(&self) -> &dyn CompletionClient {
        match self {
            Provider::Anthropic(c) => c,
            Provider::OpenAi(c) => c,
            Provider::Gemini(c) => c,
            Provider::Local(c) => c,
        }
    }
}

impl CompletionClient for Provider {
    fn name(&self) -> &str {
        self.client().name()
    }

    fn model(&self) -> &str {
        self.client().model()
    }

    fn complete<'a>(&'a self, prompt: &'a str, max_output_tokens: u32) -> CompletionFuture<'a> {
        self.client().complete(prompt, max_output_tokens)
    }
}

pub(crate) fn http_client(provider: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::fatal(provider, format!("failed to build HTTP client: {e}")))
}

/// Map a failed request to transport or fatal.
pub(crate) fn send_error(provider: &str, err: reqwest::Error) -> ProviderError {
    if err.is_builder() {
        ProviderError::fatal(provider, format!("invalid request: {err}"))
    } else {
        ProviderError::transport(provider, format!("request failed: {err}"))
    }
}

/// Map a non-success HTTP status to transport or fatal.
///
/// Timeouts, rate limits and server errors are worth retrying; any other
/// client error means the request itself is wrong.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let detail = extract_error_message(body).unwrap_or_else(|| truncate(body, 200));
    let message = format!("HTTP {}: {}", status.as_u16(), detail);
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ProviderError::transport(provider, message)
    } else {
        ProviderError::fatal(provider, message)
    }
}

pub(crate) fn estimated_tokens(text: &str) -> u64 {
    strata_core::chunker::estimate_tokens(text) as u64
}

pub(crate) fn parse_error(provider: &str, err: serde_json::Error) -> ProviderError {
    ProviderError::fatal(provider, format!("failed to parse response: {err}"))
}

/// All three cloud APIs nest their message under `error.message`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
