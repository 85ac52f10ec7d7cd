//! Deterministic offline provider.
//!
//! Performs no I/O. The reply is the first non-empty line of the prompt
//! behind a fixed marker, cut to half of the output allowance in
//! characters. The orchestrator uses it as the fallback for every other
//! provider.

use super::{estimated_tokens, Completion, CompletionClient, CompletionFuture};

/// Marker prefixed to every offline reply.
pub const OFFLINE_MARKER: &str = "[offline summary] ";

const NAME: &str = "local";

#[derive(Debug, Clone)]
pub struct LocalProvider {
    model: String,
}

impl LocalProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    /// The reply this provider gives for `prompt`.
    pub fn respond(&self, prompt: &str, max_output_tokens: u32) -> Completion {
        let headline = prompt
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("");
        let budget = (max_output_tokens / 2) as usize;
        let text: String = format!("{OFFLINE_MARKER}{headline}")
            .chars()
            .take(budget)
            .collect();

        Completion {
            input_tokens: estimated_tokens(prompt),
            output_tokens: estimated_tokens(&text),
            text,
        }
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new(super::ProviderKind::Local.default_model())
    }
}

impl CompletionClient for LocalProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, prompt: &'a str, max_output_tokens: u32) -> CompletionFuture<'a> {
        Box::pin(async move { Ok(self.respond(prompt, max_output_tokens)) })
    }
}
