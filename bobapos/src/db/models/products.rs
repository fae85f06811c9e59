//! Database models for menu products.

use crate::api::models::products::{ProductCreate, ProductUpdate};
use crate::db::models::allergens::AllergenDBResponse;
use crate::types::{AllergenId, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Menu category, stored as the `product_type` Postgres enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "product_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    MilkTea,
    FruitTea,
    BrewedTea,
    FreshMilk,
    IceBlended,
    TeaMojito,
    Creama,
    IceCream,
    Misc,
    Topping,
    SpecialItem,
}

impl ProductType {
    /// Human-readable category name, as printed on the menu board
    pub fn label(&self) -> &'static str {
        match self {
            ProductType::MilkTea => "Milk Tea",
            ProductType::FruitTea => "Fruit Tea",
            ProductType::BrewedTea => "Brewed Tea",
            ProductType::FreshMilk => "Fresh Milk",
            ProductType::IceBlended => "Ice Blended",
            ProductType::TeaMojito => "Tea Mojito",
            ProductType::Creama => "Creama",
            ProductType::IceCream => "Ice Cream",
            ProductType::Misc => "Misc",
            ProductType::Topping => "Topping",
            ProductType::SpecialItem => "Special Item",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A stock change: either an absolute count (after a stocktake) or a delta (a delivery, a spill)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InventoryChange {
    Set(i32),
    Adjust(i32),
}

/// Database request for creating a new product
#[derive(Debug, Clone)]
pub struct ProductCreateDBRequest {
    pub name: String,
    pub product_type: ProductType,
    pub price_cents: i32,
    pub inventory: i32,
    pub calories: i32,
    pub img_src: Option<String>,
    pub allergen_ids: Vec<AllergenId>,
}

impl From<ProductCreate> for ProductCreateDBRequest {
    fn from(api: ProductCreate) -> Self {
        Self {
            name: api.name.trim().to_string(),
            product_type: api.product_type,
            price_cents: api.price_cents,
            inventory: api.inventory,
            calories: api.calories,
            img_src: api.img_src,
            allergen_ids: dedup_ids(api.allergen_ids),
        }
    }
}

/// Database request for updating a product. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdateDBRequest {
    pub name: Option<String>,
    pub product_type: Option<ProductType>,
    pub price_cents: Option<i32>,
    pub inventory: Option<i32>,
    pub calories: Option<i32>,
    /// `Some(None)` clears the image
    pub img_src: Option<Option<String>>,
    pub allergen_ids: Option<Vec<AllergenId>>,
}

impl ProductUpdateDBRequest {
    /// Whether the update touches anything the menu summary (and so the embedding) is built from
    pub fn changes_summary(&self) -> bool {
        self.name.is_some() || self.product_type.is_some() || self.calories.is_some() || self.allergen_ids.is_some()
    }
}

impl From<ProductUpdate> for ProductUpdateDBRequest {
    fn from(api: ProductUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_string()),
            product_type: api.product_type,
            price_cents: api.price_cents,
            inventory: api.inventory,
            calories: api.calories,
            img_src: api.img_src,
            allergen_ids: api.allergen_ids.map(dedup_ids),
        }
    }
}

fn dedup_ids(mut ids: Vec<AllergenId>) -> Vec<AllergenId> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Database response for a product
#[derive(Debug, Clone)]
pub struct ProductDBResponse {
    pub id: ProductId,
    pub name: String,
    pub product_type: ProductType,
    pub price_cents: i32,
    pub inventory: i32,
    pub calories: i32,
    pub img_src: Option<String>,
    pub allergens: Vec<AllergenDBResponse>,
    pub has_embedding: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields the chatbot needs to describe and rank a product
#[derive(Debug, Clone)]
pub struct ProductEmbedding {
    pub id: ProductId,
    pub name: String,
    pub product_type: ProductType,
    pub price_cents: i32,
    pub calories: i32,
    pub inventory: i32,
    pub allergens: Vec<String>,
    pub embedding: Option<Vec<f32>>,
}
