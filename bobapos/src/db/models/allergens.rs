//! Database models for allergens.

use crate::api::models::allergens::{AllergenCreate, AllergenUpdate};
use crate::types::AllergenId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database request for creating an allergen
#[derive(Debug, Clone)]
pub struct AllergenCreateDBRequest {
    pub name: String,
}

impl From<AllergenCreate> for AllergenCreateDBRequest {
    fn from(api: AllergenCreate) -> Self {
        Self {
            name: api.name.trim().to_lowercase(),
        }
    }
}

/// Database request for renaming an allergen
#[derive(Debug, Clone)]
pub struct AllergenUpdateDBRequest {
    pub name: Option<String>,
}

impl From<AllergenUpdate> for AllergenUpdateDBRequest {
    fn from(api: AllergenUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_lowercase()),
        }
    }
}

/// Database response for an allergen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AllergenDBResponse {
    pub id: AllergenId,
    pub name: String,
}
