//! Adapter for the three provider kinds that speak the OpenAI-compatible
//! chat-completions wire format: groq, openrouter, cerebras.

use std::pin::Pin;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::adapter::{Adapter, AdapterError, ChunkStream};
use crate::types::{ChatMessage, CompletionOptions};
use crate::upstream::ProviderKind;

/// Default base URL per provider kind, used when no override is
/// configured for that upstream instance.
#[must_use]
pub fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Groq => "https://api.groq.com/openai/v1",
        ProviderKind::Openrouter => "https://openrouter.ai/api/v1",
        ProviderKind::Cerebras => "https://api.cerebras.ai/v1",
        ProviderKind::Gemini => unreachable!("gemini uses its own adapter"),
    }
}

pub struct OpenAiCompatAdapter {
    provider_kind: ProviderKind,
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl OpenAiCompatAdapter {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(provider_kind: ProviderKind, base_url: &str, api_key: SecretString) -> Result<Self, url::ParseError> {
        Ok(Self {
            provider_kind,
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            api_key,
        })
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn wire_request(&self, messages: &[ChatMessage], options: &CompletionOptions, stream: bool) -> WireRequest {
        WireRequest {
            model: options.model.clone(),
            messages: messages.to_vec(),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stop: options.stop.clone(),
            presence_penalty: options.presence_penalty,
            frequency_penalty: options.frequency_penalty,
            tools: options.tools.clone(),
            tool_choice: options.tool_choice.clone(),
            stream,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    content: Option<String>,
}

#[async_trait]
impl Adapter for OpenAiCompatAdapter {
    fn provider_kind(&self) -> ProviderKind {
        self.provider_kind
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, AdapterError> {
        let wire_request = self.wire_request(messages, options, true);

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| AdapterError::new(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::new(format!("provider returned {status}: {body}")));
        }

        let event_stream = response.bytes_stream().eventsource();

        let mapped = event_stream.filter_map(|result| async move {
            match result {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data.is_empty() || data == "[DONE]" {
                        return None;
                    }
                    match serde_json::from_str::<WireStreamChunk>(&data) {
                        Ok(chunk) => chunk
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.delta.content)
                            .filter(|text| !text.is_empty())
                            .map(Ok),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                            None
                        }
                    }
                }
                Err(e) => Some(Err(AdapterError::new(e.to_string()))),
            }
        });

        Ok(Box::pin(mapped) as Pin<Box<dyn Stream<Item = Result<String, AdapterError>> + Send>>)
    }
}
