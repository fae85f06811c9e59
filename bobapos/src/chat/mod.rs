//! Product-recommendation chatbot.
//!
//! A question is embedded, compared by cosine similarity against the stored product embeddings,
//! and answered by a completion model that sees the closest menu items plus the conversation so
//! far. Conversations are kept in memory only.
//!
//! - [`provider`]: the [`LanguageModel`] seam and its OpenAI-compatible implementation
//! - [`similarity`]: cosine similarity and top-k ranking
//! - [`conversations`]: the in-memory conversation store and its eviction sweep
//! - [`embeddings`]: backfilling product embeddings
//! - [`service`]: [`ChatService`], tying the above together

pub mod conversations;
pub mod embeddings;
pub mod provider;
pub mod service;
pub mod similarity;

pub use conversations::ConversationStore;
pub use provider::{LanguageModel, OpenAiCompatible};
pub use service::ChatService;
