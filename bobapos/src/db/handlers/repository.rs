//! Shared CRUD contract for table-backed repositories.

use std::collections::HashMap;

use crate::db::errors::Result;

/// CRUD operations over one Postgres table.
///
/// Requests and responses are the `*DBRequest` / `*DBResponse` types from [`crate::db::models`].
/// Implementors hold a `&mut PgConnection`, so the caller decides whether they run inside a
/// transaction or on a plain pooled connection.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest;
    type UpdateRequest;
    type Response;
    type Id: Send + Sync;
    type Filter: Send + Sync;

    /// Insert a new row
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Fetch one row, `None` if it doesn't exist
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Fetch several rows keyed by ID; missing IDs are simply absent
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Returns whether a row was deleted
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Partially update a row; fails with `NotFound` if it doesn't exist
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
