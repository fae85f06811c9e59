//! In-memory chat history, keyed by conversation id.
//!
//! Conversations live only as long as the process and are evicted once idle for the configured
//! TTL by a periodic sweep. The store holds at most `max_conversations`; starting one more drops the
//! least recently active conversation.

use super::provider::ChatMessage;
use dashmap::DashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
    pub last_active: Instant,
}

#[derive(Debug)]
pub struct ConversationStore {
    conversations: DashMap<Uuid, Conversation>,
    max_history: usize,
    max_conversations: usize,
}

impl ConversationStore {
    pub fn new(max_history: usize, max_conversations: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            max_history,
            max_conversations: max_conversations.max(1),
        }
    }

    /// Messages exchanged so far, oldest first. Empty for unknown ids.
    pub fn history(&self, id: Uuid) -> Vec<ChatMessage> {
        self.conversations.get(&id).map(|c| c.messages.clone()).unwrap_or_default()
    }

    /// Append messages, creating the conversation if needed and dropping the oldest messages
    /// beyond `max_history`.
    pub fn append(&self, id: Uuid, messages: impl IntoIterator<Item = ChatMessage>) {
        if !self.conversations.contains_key(&id) {
            while self.conversations.len() >= self.max_conversations {
                if !self.evict_least_recent() {
                    break;
                }
            }
        }

        let mut entry = self.conversations.entry(id).or_insert_with(|| Conversation {
            messages: Vec::new(),
            last_active: Instant::now(),
        });

        entry.messages.extend(messages);
        let excess = entry.messages.len().saturating_sub(self.max_history);
        entry.messages.drain(..excess);
        entry.last_active = Instant::now();
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Evict conversations idle for longer than `ttl`. Returns how many were removed.
    pub fn sweep(&self, ttl: Duration) -> usize {
        match Instant::now().checked_sub(ttl) {
            Some(cutoff) => self.evict_idle_since(cutoff),
            None => 0,
        }
    }

    /// Drop the conversation that has been idle longest. Returns false if the store was empty.
    fn evict_least_recent(&self) -> bool {
        let oldest = self
            .conversations
            .iter()
            .min_by_key(|c| c.last_active)
            .map(|c| *c.key());

        match oldest {
            Some(id) => {
                self.conversations.remove(&id);
                debug!(conversation_id = %id, "Conversation store full, evicted least recently active");
                true
            }
            None => false,
        }
    }

    fn evict_idle_since(&self, cutoff: Instant) -> usize {
        let before = self.conversations.len();
        self.conversations.retain(|_, c| c.last_active >= cutoff);
        before.saturating_sub(self.conversations.len())
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `shutdown` is cancelled
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, ttl: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Starting conversation sweeper (every {:?}, ttl {:?})", interval, ttl);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Received shutdown signal, stopping conversation sweeper");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = self.sweep(ttl);
                        if evicted > 0 {
                            debug!(evicted, remaining = self.len(), "Evicted idle conversations");
                        }
                    }
                }
            }
        })
    }
}
