//! Error types for strata-llm.

use thiserror::Error;

/// Failure of a single provider call.
///
/// Callers of the orchestrator never see these: they are recorded in the
/// usage log and turned into retries or a fallback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure, timeout, rate limit or server error. Retryable.
    #[error("{provider} transport error: {message}")]
    Transport { provider: String, message: String },

    /// The provider rejected the request (bad credentials, bad request,
    /// unparseable response). Not retryable.
    #[error("{provider} rejected the request: {message}")]
    Fatal { provider: String, message: String },

    /// A required setting such as the API key is missing.
    #[error("{provider} is not configured: {missing} is not set")]
    NotConfigured { provider: String, missing: String },
}

impl ProviderError {
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn fatal(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Fatal {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transport { .. })
    }
}

/// Orchestrator-level signals.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The run's token budget is spent; remaining calls go to the fallback.
    #[error("token budget exhausted: {used} of {budget} tokens used")]
    BudgetExceeded { budget: u64, used: u64 },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result type alias for provider calls.
pub type Result<T> = std::result::Result<T, ProviderError>;
