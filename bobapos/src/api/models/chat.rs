//! API models for the recommendation chatbot.

use crate::{
    db::models::products::ProductType,
    errors::{Error, Result},
    types::ProductId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    /// Continue an earlier conversation. Omit to start a new one.
    pub conversation_id: Option<Uuid>,
}

impl ChatRequest {
    pub fn validate(&self, max_chars: usize) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Message cannot be empty".to_string(),
            });
        }
        let len = self.message.chars().count();
        if len > max_chars {
            return Err(Error::BadRequest {
                message: format!("Message is too long ({len} characters, at most {max_chars})"),
            });
        }
        Ok(())
    }
}

/// A menu item the chatbot considered relevant to the question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub name: String,
    pub product_type: ProductType,
    pub price_cents: i32,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub calories: i32,
    pub allergens: Vec<String>,
    /// Cosine similarity to the question, -1 to 1
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub reply: String,
    pub conversation_id: Uuid,
    pub recommendations: Vec<Recommendation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            conversation_id: None,
        }
    }

    #[test]
    fn test_validation() {
        assert!(request("something without dairy?").validate(2000).is_ok());
        assert!(request("").validate(2000).is_err());
        assert!(request("   \n").validate(2000).is_err());
        assert!(request(&"a".repeat(2001)).validate(2000).is_err());
        // Characters, not bytes
        assert!(request(&"茶".repeat(2000)).validate(2000).is_ok());
    }
}
