//! Database models for recorded transactions (orders, returns, voids and discards).

use crate::types::{EmployeeId, ProductId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// How the customer paid, stored as the `payment_type` Postgres enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    Card,
    Check,
    GiftCard,
}

/// What kind of register event a transaction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[default]
    Sale,
    /// Customer brought items back; stock is restored
    Return,
    /// Order cancelled at the register before anything was made
    Void,
    /// Product thrown away (spoiled, spilled)
    Discard,
}

impl TransactionType {
    /// Sign applied to item quantities when adjusting stock
    pub fn inventory_sign(&self) -> i64 {
        match self {
            TransactionType::Sale | TransactionType::Discard => -1,
            TransactionType::Return => 1,
            TransactionType::Void => 0,
        }
    }
}

/// One requested line of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Database request for recording a transaction
#[derive(Debug, Clone)]
pub struct TransactionCreateDBRequest {
    pub employee_id: EmployeeId,
    pub payment_type: PaymentType,
    pub transaction_type: TransactionType,
    pub items: Vec<TransactionItemRequest>,
}

impl TransactionCreateDBRequest {
    /// Collapse repeated lines for the same product into one, ordered by product id.
    ///
    /// Quantities are summed in `i64` so that two large lines can't wrap.
    pub fn merged_items(&self) -> BTreeMap<ProductId, i64> {
        let mut merged = BTreeMap::new();
        for item in &self.items {
            *merged.entry(item.product_id).or_insert(0i64) += i64::from(item.quantity);
        }
        merged
    }
}

/// A stored order line, with the product name joined in
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TransactionItemDBResponse {
    pub id: i32,
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub subtotal_cents: i64,
}

/// Database response for a transaction and its lines
#[derive(Debug, Clone)]
pub struct TransactionDBResponse {
    pub id: TransactionId,
    pub employee_id: EmployeeId,
    pub payment_type: PaymentType,
    pub transaction_type: TransactionType,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<TransactionItemDBResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_items_sums_duplicates() {
        let request = TransactionCreateDBRequest {
            employee_id: 1,
            payment_type: PaymentType::Cash,
            transaction_type: TransactionType::Sale,
            items: vec![
                TransactionItemRequest {
                    product_id: 7,
                    quantity: 2,
                },
                TransactionItemRequest {
                    product_id: 3,
                    quantity: 1,
                },
                TransactionItemRequest {
                    product_id: 7,
                    quantity: 1,
                },
            ],
        };

        let merged = request.merged_items();
        assert_eq!(merged.into_iter().collect::<Vec<_>>(), vec![(3, 1), (7, 3)]);
    }

    #[test]
    fn test_inventory_sign() {
        assert_eq!(TransactionType::Sale.inventory_sign(), -1);
        assert_eq!(TransactionType::Discard.inventory_sign(), -1);
        assert_eq!(TransactionType::Return.inventory_sign(), 1);
        assert_eq!(TransactionType::Void.inventory_sign(), 0);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentType::GiftCard).unwrap(), "\"gift_card\"");
        assert_eq!(serde_json::to_string(&TransactionType::Discard).unwrap(), "\"discard\"");
        assert_eq!(TransactionType::default(), TransactionType::Sale);
    }
}
