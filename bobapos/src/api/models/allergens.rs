//! API request/response models for allergens.

use crate::{
    db::models::allergens::AllergenDBResponse,
    errors::{Error, Result},
    types::AllergenId,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllergenCreate {
    pub name: String,
}

impl AllergenCreate {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Allergen name cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllergenUpdate {
    pub name: Option<String>,
}

impl AllergenUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::BadRequest {
                message: "Allergen name cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListAllergensQuery {
    /// Case-insensitive substring match on the name
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AllergenResponse {
    pub id: AllergenId,
    pub name: String,
}

impl From<AllergenDBResponse> for AllergenResponse {
    fn from(db: AllergenDBResponse) -> Self {
        Self { id: db.id, name: db.name }
    }
}
