//! Access to the embedding and completion models behind the chatbot.
//!
//! [`LanguageModel`] is the seam the rest of the crate talks to. [`OpenAiCompatible`] implements
//! it against any server exposing the OpenAI `/embeddings` and `/chat/completions` endpoints.

use crate::{config::ChatConfig, errors::Error};
use async_openai::types::{chat::CreateChatCompletionResponse, embeddings::CreateEmbeddingResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a completion request or a stored conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Embed a piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;

    /// Produce the assistant's next message for a conversation
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, Error>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// Client for an OpenAI-compatible API
pub struct OpenAiCompatible {
    http: reqwest::Client,
    base: String,
    api_key: String,
    embedding_model: String,
    completion_model: String,
}

impl OpenAiCompatible {
    pub fn new(config: &ChatConfig) -> Result<Self, Error> {
        let api_key = config.api_key.clone().ok_or_else(|| Error::Internal {
            operation: "configure chat: chat.api_key is required".to_string(),
        })?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal {
                operation: format!("build chat HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base: config.api_base.as_str().trim_end_matches('/').to_string(),
            api_key,
            embedding_model: config.embedding_model.clone(),
            completion_model: config.completion_model.clone(),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<R, Error> {
        let url = format!("{}/{endpoint}", self.base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("call {url}: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Model API returned an error: {body}");
            return Err(Error::Internal {
                operation: format!("call {url}: HTTP {status}"),
            });
        }

        response.json::<R>().await.map_err(|e| Error::Internal {
            operation: format!("parse response from {url}: {e}"),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatible {
    #[instrument(skip_all, fields(model = %self.embedding_model), err)]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };
        let response: CreateEmbeddingResponse = self.post("embeddings", &request).await?;

        response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| Error::Internal {
                operation: "embed text: no embedding data returned".to_string(),
            })
    }

    #[instrument(skip_all, fields(model = %self.completion_model, messages = messages.len()), err)]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, Error> {
        let request = CompletionRequest {
            model: &self.completion_model,
            messages,
        };
        let response: CreateChatCompletionResponse = self.post("chat/completions", &request).await?;
        if let Some(usage) = &response.usage {
            debug!(total_tokens = usage.total_tokens, "Completion finished");
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Internal {
                operation: "complete chat: no content returned".to_string(),
            })
    }
}

/// Canned model for tests: every text embeds to the same vector and every completion gets the
/// same reply. Requests are recorded.
#[cfg(test)]
pub struct StaticModel {
    pub embedding: Vec<f32>,
    pub reply: String,
    pub calls: std::sync::Mutex<Vec<Vec<ChatMessage>>>,
}

#[cfg(test)]
impl StaticModel {
    pub fn new(embedding: Vec<f32>, reply: &str) -> Self {
        Self {
            embedding,
            reply: reply.to_string(),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl LanguageModel for StaticModel {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, Error> {
        Ok(self.embedding.clone())
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, Error> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}
