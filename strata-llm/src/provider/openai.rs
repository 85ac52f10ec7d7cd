//! OpenAI chat completions client.

use serde::{Deserialize, Serialize};

use super::{
    estimated_tokens, http_client, parse_error, send_error, status_error, Completion,
    CompletionClient, CompletionFuture, ProviderSettings,
};
use crate::error::{ProviderError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const NAME: &str = "openai";

pub struct OpenAiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(settings: &ProviderSettings, api_key: String) -> Result<Self> {
        let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            http: http_client(NAME, settings.timeout)?,
            url: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            api_key,
            model: settings.model_name(),
            temperature: settings.temperature,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, prompt: &'a str, max_output_tokens: u32) -> CompletionFuture<'a> {
        Box::pin(async move {
            let body = ChatRequest {
                model: &self.model,
                messages: [ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                max_tokens: max_output_tokens,
            };

            let response = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| send_error(NAME, e))?;

            let status = response.status();
            let text = response.text().await.map_err(|e| send_error(NAME, e))?;
            if !status.is_success() {
                return Err(status_error(NAME, status, &text));
            }

            let parsed: ChatResponse =
                serde_json::from_str(&text).map_err(|e| parse_error(NAME, e))?;
            let choice = parsed
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::fatal(NAME, "response contained no choices"))?;
            let output = choice.message.content.unwrap_or_default();
            let (input_tokens, output_tokens) = match parsed.usage {
                Some(u) => (u.prompt_tokens, u.completion_tokens),
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
