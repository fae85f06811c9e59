//! API request/response models for register transactions.

use super::pagination::Pagination;
use crate::{
    db::models::transactions::{
        PaymentType, TransactionCreateDBRequest, TransactionDBResponse, TransactionItemDBResponse, TransactionItemRequest,
        TransactionType,
    },
    errors::{Error, Result},
    types::{EmployeeId, ProductId, TransactionId, cents_to_dollars},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Upper bound on a single line, to catch fat-fingered quantities at the register
pub const MAX_LINE_QUANTITY: i32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionItemCreate {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A transaction as rung up at the register. The employee is taken from the session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionCreate {
    pub payment_type: PaymentType,
    /// Defaults to `sale`
    #[serde(default)]
    pub transaction_type: TransactionType,
    pub items: Vec<TransactionItemCreate>,
}

impl TransactionCreate {
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::BadRequest {
                message: "A transaction needs at least one item".to_string(),
            });
        }

        if let Some(item) = self.items.iter().find(|i| i.quantity <= 0 || i.quantity > MAX_LINE_QUANTITY) {
            return Err(Error::BadRequest {
                message: format!(
                    "Quantity for product {} must be between 1 and {MAX_LINE_QUANTITY}, got {}",
                    item.product_id, item.quantity
                ),
            });
        }

        Ok(())
    }

    pub fn into_db_request(self, employee_id: EmployeeId) -> TransactionCreateDBRequest {
        TransactionCreateDBRequest {
            employee_id,
            payment_type: self.payment_type,
            transaction_type: self.transaction_type,
            items: self
                .items
                .into_iter()
                .map(|i| TransactionItemRequest {
                    product_id: i.product_id,
                    quantity: i.quantity,
                })
                .collect(),
        }
    }
}

/// Query parameters for listing transactions
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListTransactionsQuery {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    #[param(value_type = Option<i32>)]
    pub employee_id: Option<EmployeeId>,
    pub payment_type: Option<PaymentType>,
    pub transaction_type: Option<TransactionType>,
    /// Only transactions at or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Only transactions before this instant
    pub to: Option<DateTime<Utc>>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionItemResponse {
    pub id: i32,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub subtotal_cents: i64,
}

impl From<TransactionItemDBResponse> for TransactionItemResponse {
    fn from(db: TransactionItemDBResponse) -> Self {
        Self {
            id: db.id,
            product_id: db.product_id,
            product_name: db.product_name,
            quantity: db.quantity,
            subtotal_cents: db.subtotal_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: TransactionId,
    pub employee_id: EmployeeId,
    pub payment_type: PaymentType,
    pub transaction_type: TransactionType,
    /// Sum of the item subtotals, in cents
    pub total_cents: i64,
    /// Total in dollars, as a string
    #[schema(value_type = String)]
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub items: Vec<TransactionItemResponse>,
}

impl From<TransactionDBResponse> for TransactionResponse {
    fn from(db: TransactionDBResponse) -> Self {
        Self {
            id: db.id,
            employee_id: db.employee_id,
            payment_type: db.payment_type,
            transaction_type: db.transaction_type,
            total_cents: db.total_cents,
            total: cents_to_dollars(db.total_cents),
            created_at: db.created_at,
            items: db.items.into_iter().map(Into::into).collect(),
        }
    }
}
