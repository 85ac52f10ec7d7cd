//! Google Gemini generateContent client.

use serde::{Deserialize, Serialize};

use super::{
    estimated_tokens, http_client, parse_error, send_error, status_error, Completion,
    CompletionClient, CompletionFuture, ProviderSettings,
};
use crate::error::{ProviderError, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const NAME: &str = "gemini";

pub struct GeminiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(settings: &ProviderSettings, api_key: String) -> Result<Self> {
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let model = settings.model_name();
        Ok(Self {
            http: http_client(NAME, settings.timeout)?,
            url: format!(
                "{}/v1beta/models/{}:generateContent",
                base.trim_end_matches('/'),
                model
            ),
            api_key,
            model,
            temperature: settings.temperature,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl CompletionClient for GeminiClient {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, prompt: &'a str, max_output_tokens: u32) -> CompletionFuture<'a> {
        Box::pin(async move {
            let body = GenerateRequest {
                contents: [Content {
                    role: "user",
                    parts: [Part { text: prompt }],
                }],
                generation_config: GenerationConfig {
                    temperature: self.temperature,
                    max_output_tokens,
                },
            };

            let response = self
                .http
                .post(&self.url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| send_error(NAME, e))?;

            let status = response.status();
            let text = response.text().await.map_err(|e| send_error(NAME, e))?;
            if !status.is_success() {
                return Err(status_error(NAME, status, &text));
            }

            let parsed: GenerateResponse =
                serde_json::from_str(&text).map_err(|e| parse_error(NAME, e))?;
            let content = parsed
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .ok_or_else(|| ProviderError::fatal(NAME, "response contained no candidates"))?;
            let output: String = content.parts.into_iter().filter_map(|p| p.text).collect();
            let (input_tokens, output_tokens) = match parsed.usage_metadata {
                Some(u) => (u.prompt_token_count, u.candidates_token_count),
                None => (estimated_tokens(prompt), estimated_tokens(&output)),
            };

            Ok(Completion {
                text: output,
                input_tokens,
                output_tokens,
            })
        })
    }
}
