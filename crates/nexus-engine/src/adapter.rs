use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt, TryStreamExt};
use thiserror::Error;

use crate::types::{ChatMessage, ChoiceMessage, CompletionOptions, CompletionResponse};
use crate::upstream::ProviderKind;

/// Failure from one adapter call.
///
/// The Failover Engine is the only consumer that decides whether an
/// `AdapterError` becomes an `UpstreamAttempt` or a `CommittedStream`
/// `GatewayError`, based on whether a chunk had already been emitted.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AdapterError(pub String);

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A lazy, non-restartable sequence of non-empty text chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, AdapterError>> + Send>>;

/// External streaming capability for one remote chat service.
///
/// Implementations translate a validated message list and pass-through
/// options into that provider's wire protocol. Dropping the returned stream
/// must release the underlying connection promptly; this falls out for
/// free when the stream is built over a `reqwest` response body.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Which provider kind this instance serves.
    fn provider_kind(&self) -> ProviderKind;

    /// Open a lazy sequence of text chunks for the given request.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, AdapterError>;

    /// Non-streaming completion. The default implementation concatenates
    /// the streaming sequence; adapters may override this with a native
    /// non-streaming call.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, AdapterError> {
        let stream = self.stream(messages, options).await?;
        let text = stream
            .try_fold(String::new(), |mut acc, chunk| async move {
                acc.push_str(&chunk);
                Ok(acc)
            })
            .await?;

        Ok(CompletionResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            object: "chat.completion".to_owned(),
            created: now_unix(),
            model: options.model.clone(),
            choices: vec![crate::types::Choice {
                index: 0,
                message: ChoiceMessage::text(text),
                finish_reason: Some(crate::types::FinishReason::Stop),
            }],
            usage: None,
        })
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
