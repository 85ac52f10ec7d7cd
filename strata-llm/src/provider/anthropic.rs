//! Anthropic messages API client.

use serde::{Deserialize, Serialize};

use super::{
    estimated_tokens, http_client, parse_error, send_error, status_error, Completion,
    CompletionClient, CompletionFuture, ProviderSettings,
};
use crate::error::Result;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const NAME: &str = "anthropic";

pub struct AnthropicClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl AnthropicClient {
    pub fn new(settings: &ProviderSettings, api_key: String) -> Result<Self> {
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            http: http_client(NAME, settings.timeout)?,
            url: format!("{}/v1/messages", base.trim_end_matches('/')),
            api_key,
            model: settings.model_name(),
            temperature: settings.temperature,
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl CompletionClient for AnthropicClient {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, prompt: &'a str, max_output_tokens: u32) -> CompletionFuture<'a> {
        Box::pin(async move {
            let body = MessagesRequest {
                model: &self.model,
                max_tokens: max_output_tokens,
                temperature: self.temperature,
                messages: [Message {
                    role: "user",
                    content: prompt,
                }],
            };

            let response = self
                .http
                .post(&self.url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| send_error(NAME, e))?;

            let status = response.status();
            let text = response.text().await.map_err(|e| send_error(NAME, e))?;
            if !status.is_success() {
                return Err(status_error(NAME, status, &text));
            }

            let parsed: MessagesResponse =
                serde_json::from_str(&text).map_err(|e| parse_error(NAME, e))?;
            let output: String = parsed.content.into_iter().filter_map(|b| b.text).collect();
            let (input_tokens, output_tokens) = match parsed.usage {
                Some(u) => (u.input_tokens, u.output_tokens),
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
