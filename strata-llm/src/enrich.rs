//! Class summaries and a project overview for a finalized graph.

use futures::future::join_all;
use strata_core::chunker;
use strata_core::types::{ClassInfo, Enrichment};
use strata_core::KnowledgeGraph;
use tracing::{debug, info, warn};

use crate::orchestrator::Orchestrator;

/// Method signatures listed per class prompt.
pub const MAX_SIGNATURES: usize = 20;
/// Characters kept from a class description.
pub const DESCRIPTION_LIMIT: usize = 500;
/// Classes named in the overview prompt.
pub const OVERVIEW_CLASSES: usize = 30;
/// Characters kept from the project overview.
pub const OVERVIEW_LIMIT: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Prompts estimated above this are split with the token chunker.
    pub max_input_tokens: usize,
    pub max_output_tokens: u32,
    pub chunk_target_tokens: usize,
    pub chunk_overlap_tokens: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            max_input_tokens: 12_000,
            max_output_tokens: 1_500,
            chunk_target_tokens: 1_200,
            chunk_overlap_tokens: 200,
        }
    }
}

pub struct Enricher<'a> {
    orchestrator: &'a Orchestrator,
    options: EnrichOptions,
}

impl<'a> Enricher<'a> {
    pub fn new(orchestrator: &'a Orchestrator, options: EnrichOptions) -> Self {
        Self {
            orchestrator,
            options,
        }
    }

    /// Describe every class and the project as a whole.
    ///
    /// Calls run concurrently up to the orchestrator's limit. The graph is
    /// only read.
    pub async fn enrich(&self, graph: &KnowledgeGraph) -> Enrichment {
        info!(classes = graph.class_count(), "enriching knowledge graph");

        let requests = graph.classes().iter().map(|(fqn, class)| async move {
            let prompt = class_prompt(class, &graph.dependencies_of(fqn));
            let text = self.describe(&prompt).await;
            (fqn.clone(), truncate_chars(text.trim(), DESCRIPTION_LIMIT))
        });
        let descriptions = join_all(requests).await.into_iter().collect();

        let overview = if graph.is_empty() {
            None
        } else {
            let text = self.describe(&overview_prompt(graph)).await;
            Some(truncate_chars(text.trim(), OVERVIEW_LIMIT))
        };

        Enrichment {
            overview,
            descriptions,
        }
    }

    async fn describe(&self, prompt: &str) -> String {
        let max_output = self.options.max_output_tokens;
        if chunker::estimate_tokens(prompt) <= self.options.max_input_tokens {
            return self.orchestrator.complete(prompt, max_output).await;
        }

        match chunker::chunk(
            prompt,
            self.options.chunk_target_tokens,
            self.options.chunk_overlap_tokens,
        ) {
            Ok(chunks) => {
                debug!(chunks = chunks.len(), "prompt exceeds input limit, chunking");
                let mut parts = Vec::with_capacity(chunks.len());
                for chunk in &chunks {
                    let part = self.orchestrator.complete(&chunk.text, max_output).await;
                    let part = part.trim();
                    if !part.is_empty() {
                        parts.push(part.to_string());
                    }
                }
                parts.join(" ")
            }
            Err(err) => {
                warn!(error = %err, "invalid chunk settings, sending prompt unsplit");
                self.orchestrator.complete(prompt, max_output).await
            }
        }
    }
}

/// Prompt asking for a short description of one class.
///
/// The first line names the class so the offline provider's reply stays
/// meaningful.
pub fn class_prompt(class: &ClassInfo, dependencies: &[&str]) -> String {
    let signatures = class
        .methods
        .iter()
        .take(MAX_SIGNATURES)
        .map(|m| m.signature())
        .collect::<Vec<_>>()
        .join("\n");
    let dependencies = if dependencies.is_empty() {
        "None".to_string()
    } else {
        dependencies.join(", ")
    };
    format!(
        "Class: {} ({})\n\
         You are summarizing a Java class for documentation.\n\
         Dependencies: {}\n\
         Method signatures:\n{}\n\
         Write a concise 1-2 sentence description of the class purpose.",
        class.qualified_name(),
        class.category,
        dependencies,
        signatures
    )
}

/// Prompt asking for a project summary from the first class names.
pub fn overview_prompt(graph: &KnowledgeGraph) -> String {
    let names = graph
        .classes()
        .values()
        .take(OVERVIEW_CLASSES)
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Project with {} classes: {}\n\
         Summarize this Java project in 1-2 sentences based on its class names.",
        graph.class_count(),
        names
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
