//! API request/response models for menu products.

use super::allergens::AllergenResponse;
use crate::{
    db::models::products::{InventoryChange, ProductDBResponse, ProductType},
    errors::{Error, Result},
    types::{AllergenId, ProductId, cents_to_dollars},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

// Request models

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductCreate {
    pub name: String,
    pub product_type: ProductType,
    /// Price in cents
    pub price_cents: i32,
    /// Units in stock (default 0)
    #[serde(default)]
    pub inventory: i32,
    #[serde(default)]
    pub calories: i32,
    pub img_src: Option<String>,
    /// Allergens contained in the product
    #[serde(default)]
    pub allergen_ids: Vec<AllergenId>,
}

impl ProductCreate {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_non_negative("price_cents", self.price_cents)?;
        validate_non_negative("inventory", self.inventory)?;
        validate_non_negative("calories", self.calories)
    }
}

/// Partial update; omitted fields are left unchanged. `allergen_ids`, when present, replaces the set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub product_type: Option<ProductType>,
    pub price_cents: Option<i32>,
    pub inventory: Option<i32>,
    pub calories: Option<i32>,
    /// `null` removes the image; leaving the field out keeps it
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub img_src: Option<Option<String>>,
    pub allergen_ids: Option<Vec<AllergenId>>,
}

impl ProductUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            validate_name(name)?;
        }
        if let Some(price_cents) = self.price_cents {
            validate_non_negative("price_cents", price_cents)?;
        }
        if let Some(inventory) = self.inventory {
            validate_non_negative("inventory", inventory)?;
        }
        if let Some(calories) = self.calories {
            validate_non_negative("calories", calories)?;
        }
        Ok(())
    }
}

/// Inventory change: `{"set": 40}` for a stocktake or `{"adjust": -2}` for a relative change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct InventoryUpdate(pub InventoryChange);

impl InventoryUpdate {
    pub fn validate(&self) -> Result<()> {
        match self.0 {
            InventoryChange::Set(n) => validate_non_negative("inventory", n),
            InventoryChange::Adjust(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceUpdate {
    pub price_cents: i32,
}

impl PriceUpdate {
    pub fn validate(&self) -> Result<()> {
        validate_non_negative("price_cents", self.price_cents)
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListProductsQuery {
    /// Only products of this category
    pub product_type: Option<ProductType>,
    /// `true` for products in stock, `false` for sold-out products
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    #[param(value_type = Option<bool>)]
    pub in_stock: Option<bool>,
}

#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
pub struct EmbedProductsQuery {
    /// Skip products that already have an embedding (default: true)
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    #[param(value_type = Option<bool>)]
    pub missing_only: Option<bool>,
}

// Response models

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub product_type: ProductType,
    pub price_cents: i32,
    /// Price in dollars, as a string to preserve precision
    #[schema(value_type = String)]
    pub price: Decimal,
    pub inventory: i32,
    pub calories: i32,
    pub img_src: Option<String>,
    pub allergens: Vec<AllergenResponse>,
    /// Whether the product can be recommended by the chatbot yet
    pub has_embedding: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductDBResponse> for ProductResponse {
    fn from(db: ProductDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            product_type: db.product_type,
            price_cents: db.price_cents,
            price: cents_to_dollars(i64::from(db.price_cents)),
            inventory: db.inventory,
            calories: db.calories,
            img_src: db.img_src,
            allergens: db.allergens.into_iter().map(Into::into).collect(),
            has_embedding: db.has_embedding,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Menu grouped by category, keyed by `product_type`
pub type ProductsByCategory = BTreeMap<ProductType, Vec<ProductResponse>>;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmbedProductsResponse {
    /// Number of products that received a new embedding
    pub embedded: usize,
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Name cannot be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: i32) -> Result<()> {
    if value < 0 {
        return Err(Error::BadRequest {
            message: format!("{field} cannot be negative"),
        });
    }
    Ok(())
}
