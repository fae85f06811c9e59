//! HTTP handlers for the allergen list shown next to menu items.

use crate::{
    AppState,
    api::models::allergens::{AllergenCreate, AllergenResponse, AllergenUpdate, ListAllergensQuery},
    auth::current_user::RequiresAdmin,
    db::{
        errors::DbError,
        handlers::{Allergens, Repository, allergens::AllergenFilter},
        models::allergens::{AllergenCreateDBRequest, AllergenUpdateDBRequest},
    },
    errors::{Error, Result},
    types::AllergenId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

fn not_found(id: AllergenId) -> Error {
    Error::NotFound {
        resource: "Allergen".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/allergens",
    tag = "allergens",
    summary = "List allergens",
    params(ListAllergensQuery),
    responses(
        (status = 200, description = "Allergens ordered by name", body = Vec<AllergenResponse>),
        (status = 500, description = "Internal server error"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_allergens(
    State(state): State<AppState>,
    Query(query): Query<ListAllergensQuery>,
) -> Result<Json<Vec<AllergenResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let allergens = Allergens::new(&mut conn)
        .list(&AllergenFilter { search: query.search })
        .await?;
    Ok(Json(allergens.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/allergens/{id}",
    tag = "allergens",
    summary = "Get an allergen",
    params(("id" = i32, Path, description = "Allergen ID")),
    responses(
        (status = 200, description = "Allergen", body = AllergenResponse),
        (status = 404, description = "Allergen not found"),
        (status = 500, description = "Internal server error"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_allergen(State(state): State<AppState>, Path(id): Path<AllergenId>) -> Result<Json<AllergenResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let allergen = Allergens::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(allergen.into()))
}

#[utoipa::path(
    post,
    path = "/allergens",
    tag = "allergens",
    summary = "Create an allergen",
    request_body = AllergenCreate,
    responses(
        (status = 201, description = "Allergen created", body = AllergenResponse),
        (status = 400, description = "Empty name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 409, description = "Allergen already exists"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_allergen(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Json(data): Json<AllergenCreate>,
) -> Result<(StatusCode, Json<AllergenResponse>)> {
    data.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let allergen = Allergens::new(&mut conn).create(&AllergenCreateDBRequest::from(data)).await?;
    Ok((StatusCode::CREATED, Json(allergen.into())))
}

#[utoipa::path(
    patch,
    path = "/allergens/{id}",
    tag = "allergens",
    summary = "Rename an allergen",
    params(("id" = i32, Path, description = "Allergen ID")),
    request_body = AllergenUpdate,
    responses(
        (status = 200, description = "Allergen updated", body = AllergenResponse),
        (status = 400, description = "Empty name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Allergen not found"),
        (status = 409, description = "Allergen already exists"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_allergen(
    State(state): State<AppState>,
    Path(id): Path<AllergenId>,
    _: RequiresAdmin,
    Json(data): Json<AllergenUpdate>,
) -> Result<Json<AllergenResponse>> {
    data.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let allergen = Allergens::new(&mut conn)
        .update(id, &AllergenUpdateDBRequest::from(data))
        .await
        .map_err(|e| match e {
            DbError::NotFound => not_found(id),
            other => other.into(),
        })?;
    Ok(Json(allergen.into()))
}

#[utoipa::path(
    delete,
    path = "/allergens/{id}",
    tag = "allergens",
    summary = "Delete an allergen",
    description = "Also removes it from every product that listed it.",
    params(("id" = i32, Path, description = "Allergen ID")),
    responses(
        (status = 204, description = "Allergen deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Allergen not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_allergen(State(state): State<AppState>, Path(id): Path<AllergenId>, _: RequiresAdmin) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Allergens::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
