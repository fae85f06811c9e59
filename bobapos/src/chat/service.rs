//! Answers customer questions with menu-aware recommendations.

use super::{
    conversations::ConversationStore,
    embeddings::product_summary,
    provider::{ChatMessage, LanguageModel},
    similarity::top_k,
};
use crate::{
    api::models::chat::{ChatRequest, ChatResponse, Recommendation},
    config::ChatConfig,
    db::{handlers::Products, models::products::ProductEmbedding},
    errors::{Error, Result},
    types::{cents_to_dollars, format_cents},
};
use sqlx::PgPool;
use std::{fmt::Write, sync::Arc};
use tracing::{debug, instrument};
use uuid::Uuid;

pub struct ChatService {
    model: Arc<dyn LanguageModel>,
    conversations: Arc<ConversationStore>,
    top_k: usize,
    max_message_chars: usize,
    system_prompt: String,
}

impl ChatService {
    pub fn new(model: Arc<dyn LanguageModel>, config: &ChatConfig) -> Self {
        Self {
            model,
            conversations: Arc::new(ConversationStore::new(config.max_history, config.max_conversations)),
            top_k: config.top_k,
            max_message_chars: config.max_message_chars,
            system_prompt: config.system_prompt.clone(),
        }
    }

    pub fn model(&self) -> &dyn LanguageModel {
        self.model.as_ref()
    }

    pub fn conversations(&self) -> Arc<ConversationStore> {
        self.conversations.clone()
    }

    /// Answer one message.
    ///
    /// The question is embedded and compared against the embedded, in-stock menu. The best
    /// matches go into the system prompt ahead of the conversation so far. An unknown
    /// `conversation_id` starts a fresh conversation under that id.
    #[instrument(skip_all, fields(conversation_id), err)]
    pub async fn respond(&self, db: &PgPool, request: ChatRequest) -> Result<ChatResponse> {
        request.validate(self.max_message_chars)?;
        let conversation_id = request.conversation_id.unwrap_or_else(Uuid::new_v4);
        tracing::Span::current().record("conversation_id", tracing::field::display(conversation_id));

        let query = self.model.embed(&request.message).await?;

        let products = {
            let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            Products::new(&mut conn).list_with_embeddings().await?
        };
        let candidates = products
            .iter()
            .filter(|p| p.inventory > 0)
            .filter_map(|p| p.embedding.as_deref().map(|e| (p, e)));
        let ranked = top_k(&query, candidates, self.top_k);
        debug!(candidates = products.len(), matched = ranked.len(), "Ranked menu items");

        let mut messages = vec![ChatMessage::system(self.system_prompt_with(&ranked))];
        messages.extend(self.conversations.history(conversation_id));
        messages.push(ChatMessage::user(request.message.clone()));

        let reply = self.model.complete(&messages).await?;

        self.conversations.append(
            conversation_id,
            [ChatMessage::user(request.message), ChatMessage::assistant(reply.clone())],
        );

        Ok(ChatResponse {
            reply,
            conversation_id,
            recommendations: ranked.into_iter().map(|(p, score)| recommendation(p, score)).collect(),
        })
    }

    fn system_prompt_with(&self, ranked: &[(&ProductEmbedding, f32)]) -> String {
        let mut prompt = self.system_prompt.clone();
        if ranked.is_empty() {
            prompt.push_str("\n\nNo menu items matched this question.");
            return prompt;
        }

        prompt.push_str("\n\nMenu items that may be relevant:");
        for (product, _) in ranked {
            let _ = write!(prompt, "\n- {} Price: {}", product_summary(product), format_cents(product.price_cents.into()));
        }
        prompt
    }
}

fn recommendation(product: &ProductEmbedding, score: f32) -> Recommendation {
    Recommendation {
        product_id: product.id,
        name: product.name.clone(),
        product_type: product.product_type,
        price_cents: product.price_cents,
        price: cents_to_dollars(product.price_cents.into()),
        calories: product.calories,
        allergens: product.allergens.clone(),
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chat::provider::{ChatRole, StaticModel},
        db::{
            handlers::Repository,
            models::products::{ProductCreateDBRequest, ProductType},
        },
    };

    fn config() -> ChatConfig {
        ChatConfig {
            top_k: 2,
            system_prompt: "You work at a boba shop.".to_string(),
            ..Default::default()
        }
    }

    fn product(id: i32, name: &str) -> ProductEmbedding {
        ProductEmbedding {
            id,
            name: name.to_string(),
            product_type: ProductType::FruitTea,
            price_cents: 550,
            calories: 180,
            inventory: 5,
            allergens: vec![],
            embedding: Some(vec![1.0, 0.0]),
        }
    }

    #[test]
    fn test_system_prompt_lists_candidates() {
        let service = ChatService::new(Arc::new(StaticModel::new(vec![1.0], "ok")), &config());
        let mango = product(1, "Mango Green Tea");

        let prompt = service.system_prompt_with(&[(&mango, 0.9)]);
        assert!(prompt.starts_with("You work at a boba shop."));
        assert!(prompt.contains("- Mango Green Tea. Type: Fruit Tea. 180 kcal. Allergens: None Price: $5.50"));

        let empty = service.system_prompt_with(&[]);
        assert!(empty.contains("No menu items matched"));
    }

    #[tokio::test]
    async fn test_invalid_message_rejected_before_calling_model() {
        let model = Arc::new(StaticModel::new(vec![1.0], "ok"));
        let service = ChatService::new(model.clone(), &config());
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .unwrap();

        let err = service
            .respond(
                &pool,
                ChatRequest {
                    message: "  ".to_string(),
                    conversation_id: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(model.calls.lock().unwrap().is_empty());
    }

    #[sqlx::test]
    async fn test_respond_ranks_in_stock_products_and_keeps_history(pool: PgPool) {
        {
            let mut conn = pool.acquire().await.unwrap();
            let mut repo = Products::new(&mut conn);
            for (name, inventory, embedding) in [
                ("Mango Green Tea", 10, [1.0f32, 0.0]),
                ("Passion Fruit Tea", 0, [1.0, 0.0]),
                ("Thai Milk Tea", 10, [0.0, 1.0]),
            ] {
                let created = repo
                    .create(&ProductCreateDBRequest {
                        name: name.to_string(),
                        product_type: ProductType::FruitTea,
                        price_cents: 500,
                        inventory,
                        calories: 120,
                        img_src: None,
                        allergen_ids: vec![],
                    })
                    .await
                    .unwrap();
                repo.set_embedding(created.id, &embedding).await.unwrap();
            }
        }

        let model = Arc::new(StaticModel::new(vec![0.9, 0.1], "Go for the mango!"));
        let service = ChatService::new(model.clone(), &config());

        let first = service
            .respond(
                &pool,
                ChatRequest {
                    message: "Something fruity?".to_string(),
                    conversation_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(first.reply, "Go for the mango!");
        let names: Vec<_> = first.recommendations.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Mango Green Tea", "Thai Milk Tea"], "sold-out items are not recommended");

        let second = service
            .respond(
                &pool,
                ChatRequest {
                    message: "Is it sweet?".to_string(),
                    conversation_id: Some(first.conversation_id),
                },
            )
            .await
            .unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);

        let calls = model.calls.lock().unwrap();
        let last = calls.last().unwrap();
        let roles: Vec<ChatRole> = last.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(service.conversations().history(first.conversation_id).len(), 4);
    }
}
