//! Database repository for allergens.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::allergens::{AllergenCreateDBRequest, AllergenDBResponse, AllergenUpdateDBRequest},
};
use crate::types::AllergenId;
use sqlx::{PgConnection, QueryBuilder};
use tracing::instrument;

/// Filter for listing allergens
#[derive(Debug, Clone, Default)]
pub struct AllergenFilter {
    /// Case-insensitive substring match on the name
    pub search: Option<String>,
}

pub struct Allergens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Allergens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Allergens<'c> {
    type CreateRequest = AllergenCreateDBRequest;
    type UpdateRequest = AllergenUpdateDBRequest;
    type Response = AllergenDBResponse;
    type Id = AllergenId;
    type Filter = AllergenFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let allergen = sqlx::query_as::<_, AllergenDBResponse>("INSERT INTO allergens (name) VALUES ($1) RETURNING id, name")
            .bind(&request.name)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(allergen)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let allergen = sqlx::query_as::<_, AllergenDBResponse>("SELECT id, name FROM allergens WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(allergen)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let allergens = sqlx::query_as::<_, AllergenDBResponse>("SELECT id, name FROM allergens WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(allergens.into_iter().map(|a| (a.id, a)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT id, name FROM allergens WHERE 1=1");

        if let Some(ref search) = filter.search {
            query.push(" AND LOWER(name) LIKE ");
            query.push_bind(format!("%{}%", search.to_lowercase()));
        }

        query.push(" ORDER BY name ASC");

        let allergens = query.build_query_as::<AllergenDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(allergens)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM allergens WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let allergen = sqlx::query_as::<_, AllergenDBResponse>(
            "UPDATE allergens SET name = COALESCE($2, name) WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(&request.name)
        .fetch_optional(&mut *self.db)
        .await?;

        allergen.ok_or(DbError::NotFound)
    }
}
