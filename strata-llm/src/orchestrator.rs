//! Retry, fallback, concurrency and budget control around one provider.
//!
//! [`Orchestrator::complete`] never fails. Every attempt against the
//! configured provider is appended to the usage log; when attempts run out,
//! the error is fatal, no provider is configured or the token budget is
//! spent, the local provider answers and the record is marked `fallback`.

use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::provider::{
    estimated_tokens, CompletionClient, LocalProvider, Provider, ProviderSettings,
};
use crate::usage::{CallOutcome, UsageLog, UsageRecord};

/// Attempts per call and the exponential backoff between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// Delay after the failed attempt number `attempt` (1-based): the
    /// initial backoff doubled per earlier failure, capped at the maximum.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << doublings)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_millis(8000))
    }
}

pub struct Orchestrator {
    primary: Option<Box<dyn CompletionClient>>,
    fallback: LocalProvider,
    policy: RetryPolicy,
    limiter: Semaphore,
    max_concurrency: usize,
    token_budget: Option<u64>,
    usage: UsageLog,
}

impl Orchestrator {
    pub fn new(primary: Option<Box<dyn CompletionClient>>) -> Self {
        Self {
            primary,
            fallback: LocalProvider::default(),
            policy: RetryPolicy::default(),
            limiter: Semaphore::new(4),
            max_concurrency: 4,
            token_budget: None,
            usage: UsageLog::new(),
        }
    }

    /// Build from settings. A provider that cannot be constructed (missing
    /// API key) is logged and every call goes to the fallback.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        match Provider::from_settings(settings) {
            Ok(provider) => Self::new(Some(Box::new(provider))),
            Err(err) => {
                warn!(
                    provider = %settings.kind,
                    error = %err,
                    "provider unavailable, using offline fallback"
                );
                Self::new(None)
            }
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        let permits = max_concurrency.max(1);
        self.limiter = Semaphore::new(permits);
        self.max_concurrency = permits;
        self
    }

    pub fn with_token_budget(mut self, token_budget: Option<u64>) -> Self {
        self.token_budget = token_budget;
        self
    }

    pub fn with_fallback(mut self, fallback: LocalProvider) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn usage(&self) -> &UsageLog {
        &self.usage
    }

    pub fn provider_name(&self) -> &str {
        self.primary
            .as_deref()
            .map(|p| p.name())
            .unwrap_or_else(|| self.fallback.name())
    }

    pub fn model_name(&self) -> &str {
        self.primary
            .as_deref()
            .map(|p| p.model())
            .unwrap_or_else(|| self.fallback.model())
    }

    pub fn token_budget(&self) -> Option<u64> {
        self.token_budget
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn has_provider(&self) -> bool {
        self.primary.is_some()
    }

    /// Complete `prompt`, falling back to the local provider on any failure.
    pub async fn complete(&self, prompt: &str, max_output_tokens: u32) -> String {
        let Some(primary) = self.primary.as_deref() else {
            return self.fall_back(prompt, max_output_tokens, 1, "no provider configured");
        };

        let mut attempt = 1;
        loop {
            let Ok(permit) = self.limiter.acquire().await else {
                let reason = "concurrency limiter closed";
                return self.fall_back(prompt, max_output_tokens, attempt, reason);
            };

            // Checked under the permit: calls queued on the limiter must see
            // the tokens spent while they waited.
            if let Err(err) = self.check_budget() {
                drop(permit);
                warn!(error = %err, "skipping provider call");
                return self.fall_back(prompt, max_output_tokens, attempt, &err.to_string());
            }

            debug!(provider = primary.name(), attempt, "provider attempt");
            match primary.complete(prompt, max_output_tokens).await {
                Ok(completion) => {
                    let record =
                        UsageRecord::new(primary.name(), primary.model(), CallOutcome::Success, attempt)
                            .with_tokens(completion.input_tokens, completion.output_tokens);
                    self.usage.append(record);
                    return completion.text;
                }
                Err(err) => {
                    let last = attempt >= self.policy.max_attempts || !err.is_retryable();
                    let outcome = if last {
                        CallOutcome::Failure
                    } else {
                        CallOutcome::Retried
                    };
                    self.usage.append(
                        UsageRecord::new(primary.name(), primary.model(), outcome, attempt)
                            .with_tokens(estimated_tokens(prompt), 0)
                            .with_error(err.to_string()),
                    );
                    drop(permit);

                    if last {
                        warn!(
                            provider = primary.name(),
                            attempt,
                            error = %err,
                            "provider call failed, using offline fallback"
                        );
                        let reason = err.to_string();
                        return self.fall_back(prompt, max_output_tokens, attempt + 1, &reason);
                    }

                    let delay = self.policy.backoff_for(attempt);
                    debug!(
                        provider = primary.name(),
                        attempt,
                        ?delay,
                        error = %err,
                        "retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn check_budget(&self) -> Result<(), LlmError> {
        match self.token_budget {
            Some(budget) => {
                let used = self.usage.billable_tokens();
                if used >= budget {
                    Err(LlmError::BudgetExceeded { budget, used })
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }

    fn fall_back(&self, prompt: &str, max_output_tokens: u32, attempt: u32, reason: &str) -> String {
        let reply = self.fallback.respond(prompt, max_output_tokens);
        let local = &self.fallback;
        self.usage.append(
            UsageRecord::new(local.name(), local.model(), CallOutcome::Fallback, attempt)
                .with_tokens(reply.input_tokens, reply.output_tokens)
                .with_error(reason),
        );
        reply.text
    }
}
