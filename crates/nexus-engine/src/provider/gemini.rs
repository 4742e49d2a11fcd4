//! Adapter for the Google Generative Language `streamGenerateContent` wire
//! format.

use std::fmt::Write as _;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::adapter::{Adapter, AdapterError, ChunkStream};
use crate::types::{ChatMessage, CompletionOptions, Content, Role};
use crate::upstream::ProviderKind;

/// Default Google Generative Language API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiAdapter {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl GeminiAdapter {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            api_key,
        })
    }

    fn stream_url(&self, model: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = format!("{base}/models/{model}:streamGenerateContent?alt=sse");
        let _ = write!(url, "&key={}", self.api_key.expose_secret());
        url
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Default, Serialize)]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(rename = "topP", skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseChunk {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

fn build_request(messages: &[ChatMessage], options: &CompletionOptions) -> GeminiRequest {
    let mut system_instruction = None;
    let mut contents = Vec::with_capacity(messages.len());

    for message in messages {
        let text = message.content.as_text();
        match message.role {
            Role::System => {
                system_instruction = Some(GeminiContent {
                    role: "system".to_owned(),
                    parts: vec![GeminiPart { text }],
                });
            }
            Role::User => contents.push(GeminiContent {
                role: "user".to_owned(),
                parts: vec![GeminiPart { text }],
            }),
            Role::Assistant => contents.push(GeminiContent {
                role: "model".to_owned(),
                parts: vec![GeminiPart { text }],
            }),
        }
    }

    let generation_config = GeminiGenerationConfig {
        temperature: options.temperature,
        top_p: options.top_p,
        max_output_tokens: options.max_tokens,
        stop_sequences: options.stop.clone(),
    };

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: Some(generation_config),
    }
}

#[async_trait]
impl Adapter for GeminiAdapter {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, AdapterError> {
        let wire_request = build_request(messages, options);
        let url = self.stream_url(&options.model);

        let response = self
            .client
            .post(&url)
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
                    if data.is_empty() {
                        return None;
                    }
                    match serde_json::from_str::<GeminiResponseChunk>(&data) {
                        Ok(chunk) => chunk
                            .candidates
                            .into_iter()
                            .next()
                            .and_then(|c| c.content)
                            .and_then(|c| c.parts.into_iter().next())
                            .and_then(|p| p.text)
                            .filter(|text| !text.is_empty())
                            .map(Ok),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %data, "skipping unparseable Gemini SSE chunk");
                            None
                        }
                    }
                }
                Err(e) => Some(Err(AdapterError::new(e.to_string()))),
            }
        });

        Ok(Box::pin(mapped))
    }
}
