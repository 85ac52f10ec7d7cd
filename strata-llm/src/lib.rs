//! Strata LLM - provider orchestration for knowledge enrichment.
//!
//! Wraps the Anthropic, OpenAI and Gemini APIs and a deterministic offline
//! provider behind one `complete(prompt, max_output_tokens)` contract, with
//! retries, exponential backoff, bounded concurrency, a per-run token budget
//! and an append-only usage log.
//!
//! # Usage
//!
//! ```no_run
//! use strata_llm::{Orchestrator, ProviderKind, ProviderSettings};
//!
//! # async fn demo() {
//! let settings = ProviderSettings::new(ProviderKind::Anthropic).with_env_api_key();
//! let orchestrator = Orchestrator::from_settings(&settings).with_max_concurrency(4);
//! let text = orchestrator.complete("Class: shop.OrderService (Service)", 256).await;
//! println!("{text} ({} attempts)", orchestrator.usage().len());
//! # }
//! ```

pub mod enrich;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod usage;

pub use enrich::{EnrichOptions, Enricher};
pub use error::{LlmError, ProviderError};
pub use orchestrator::{Orchestrator, RetryPolicy};
pub use provider::{
    Completion, CompletionClient, CompletionFuture, LocalProvider, Provider, ProviderKind,
    ProviderSettings,
};
pub use usage::{CallOutcome, UsageDocument, UsageLog, UsageRecord, UsageTotals};
