use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::ports::CompletionPort;
use crate::error::{PipelineError, Result};
use crate::infra::http_client::ensure_success;

/// Client for OpenAI-compatible `chat/completions` endpoints
/// (DeepSeek, Mistral and Perplexity all speak this dialect).
pub struct ChatCompletionClient {
    provider: &'static str,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
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
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionClient {
    pub fn new(
        provider: &'static str,
        client: reqwest::Client,
        endpoint: String,
        model: String,
        api_key: String,
    ) -> Self {
        Self {
            provider,
            client,
            endpoint,
            model,
            api_key,
            temperature: 0.1,
            max_tokens: 800,
        }
    }

    fn first_content(&self, body: ChatResponse) -> Result<String> {
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                PipelineError::Parse(format!("{} reply has no message content", self.provider))
            })
    }
}

#[async_trait]
impl CompletionPort for ChatCompletionClient {
    fn provider(&self) -> &'static str {
        self.provider
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        debug!(provider = self.provider, model = %self.model, "sending completion request");
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let resp = ensure_success(self.provider, resp).await?;
        let body: ChatResponse = resp.json().await?;
        self.first_content(body)
    }
}
