//! HTTP handlers for the menu: products, stock levels and prices.

use crate::{
    AppState,
    api::models::products::{
        EmbedProductsQuery, EmbedProductsResponse, InventoryUpdate, ListProductsQuery, PriceUpdate, ProductCreate, ProductResponse,
        ProductUpdate, ProductsByCategory,
    },
    auth::current_user::RequiresAdmin,
    chat::embeddings,
    db::{
        errors::DbError,
        handlers::{Products, Repository, products::ProductFilter},
        models::products::{ProductCreateDBRequest, ProductUpdateDBRequest},
    },
    errors::{Error, Result},
    types::ProductId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

fn not_found(id: ProductId) -> Error {
    Error::NotFound {
        resource: "Product".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    summary = "List products",
    params(ListProductsQuery),
    responses(
        (status = 200, description = "Products ordered by category and name", body = Vec<ProductResponse>),
        (status = 400, description = "Invalid filter"),
        (status = 500, description = "Internal server error"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<ProductResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let filter = ProductFilter {
        product_type: query.product_type,
        in_stock: query.in_stock,
    };

    let products = Products::new(&mut conn).list(&filter).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/products/by-category",
    tag = "products",
    summary = "Menu grouped by category",
    responses(
        (status = 200, description = "Products keyed by product type", body = std::collections::BTreeMap<String, Vec<ProductResponse>>),
        (status = 500, description = "Internal server error"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_products_by_category(State(state): State<AppState>) -> Result<Json<ProductsByCategory>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let grouped = Products::new(&mut conn).list_by_category().await?;

    Ok(Json(
        grouped
            .into_iter()
            .map(|(category, products)| (category, products.into_iter().map(Into::into).collect()))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    summary = "Get a product",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product details", body = ProductResponse),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_product(State(state): State<AppState>, Path(id): Path<ProductId>) -> Result<Json<ProductResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = Products::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(product.into()))
}

#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    summary = "Add a product to the menu",
    request_body = ProductCreate,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid product or unknown allergen"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 409, description = "A product with this name already exists"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Json(data): Json<ProductCreate>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    data.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = Products::new(&mut conn).create(&ProductCreateDBRequest::from(data)).await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

#[utoipa::path(
    patch,
    path = "/products/{id}",
    tag = "products",
    summary = "Update a product",
    params(("id" = i32, Path, description = "Product ID")),
    request_body = ProductUpdate,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid update or unknown allergen"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "A product with this name already exists"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    _: RequiresAdmin,
    Json(data): Json<ProductUpdate>,
) -> Result<Json<ProductResponse>> {
    data.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = Products::new(&mut conn)
        .update(id, &ProductUpdateDBRequest::from(data))
        .await
        .map_err(|e| match e {
            DbError::NotFound => not_found(id),
            other => other.into(),
        })?;

    Ok(Json(product.into()))
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    summary = "Remove a product from the menu",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product appears in recorded transactions"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_product(State(state): State<AppState>, Path(id): Path<ProductId>, _: RequiresAdmin) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    match Products::new(&mut conn).delete(id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(not_found(id)),
        Err(DbError::ForeignKeyViolation { .. }) => Err(Error::Conflict {
            message: "Product appears in recorded transactions and cannot be deleted; set its inventory to 0 instead".to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    patch,
    path = "/products/{id}/inventory",
    tag = "products",
    summary = "Change stock level",
    description = "`{\"set\": n}` replaces the count, `{\"adjust\": d}` adds a (possibly negative) delta. Stock never goes below zero.",
    params(("id" = i32, Path, description = "Product ID")),
    request_body = InventoryUpdate,
    responses(
        (status = 200, description = "Inventory updated", body = ProductResponse),
        (status = 400, description = "Change would make inventory negative"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_inventory(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    _: RequiresAdmin,
    Json(data): Json<InventoryUpdate>,
) -> Result<Json<ProductResponse>> {
    data.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = Products::new(&mut conn)
        .update_inventory(id, data.0)
        .await
        .map_err(|e| match e {
            DbError::NotFound => not_found(id),
            other => other.into(),
        })?;

    Ok(Json(product.into()))
}

#[utoipa::path(
    patch,
    path = "/products/{id}/price",
    tag = "products",
    summary = "Change price",
    params(("id" = i32, Path, description = "Product ID")),
    request_body = PriceUpdate,
    responses(
        (status = 200, description = "Price updated", body = ProductResponse),
        (status = 400, description = "Negative price"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_price(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    _: RequiresAdmin,
    Json(data): Json<PriceUpdate>,
) -> Result<Json<ProductResponse>> {
    data.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = Products::new(&mut conn)
        .update_price(id, data.price_cents)
        .await
        .map_err(|e| match e {
            DbError::NotFound => not_found(id),
            other => other.into(),
        })?;

    Ok(Json(product.into()))
}

#[utoipa::path(
    post,
    path = "/products/embeddings",
    tag = "products",
    summary = "Backfill chatbot embeddings",
    params(EmbedProductsQuery),
    responses(
        (status = 200, description = "Embeddings stored", body = EmbedProductsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 500, description = "Embedding API or database error"),
        (status = 503, description = "Chat is not configured"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn embed_products(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Query(query): Query<EmbedProductsQuery>,
) -> Result<Json<EmbedProductsResponse>> {
    let chat = state.chat.as_ref().ok_or_else(|| Error::ServiceUnavailable {
        message: "Chat is not enabled".to_string(),
    })?;

    let embedded = embeddings::embed_products(&state.db, chat.model(), query.missing_only.unwrap_or(true)).await?;
    Ok(Json(EmbedProductsResponse { embedded }))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::products::ProductResponse,
        db::models::products::ProductType,
        test_utils::{add_session_cookie, create_test_employee, create_test_server, lazy_test_server},
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[tokio::test]
    async fn test_writes_require_a_session() {
        let server = lazy_test_server();

        let response = server
            .post("/api/v1/products")
            .json(&json!({"name": "Taro", "product_type": "milk_tea", "price_cents": 500}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server.patch("/api/v1/products/1/price").json(&json!({"price_cents": 100})).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cashiers_cannot_edit_the_menu() {
        let server = lazy_test_server();
        let (name, value) = add_session_cookie(2, false);

        let response = server
            .delete("/api/v1/products/1")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = server
            .patch("/api/v1/products/1/inventory")
            .add_header(name, value)
            .json(&json!({"adjust": 5}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_validation_errors_are_bad_requests() {
        let server = lazy_test_server();
        let (name, value) = add_session_cookie(1, true);

        let response = server
            .post("/api/v1/products")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "  ", "product_type": "milk_tea", "price_cents": 500}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .patch("/api/v1/products/1/price")
            .add_header(name.clone(), value.clone())
            .json(&json!({"price_cents": -1}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .patch("/api/v1/products/1/inventory")
            .add_header(name, value)
            .json(&json!({"set": -3}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_embedding_backfill_needs_chat() {
        let server = lazy_test_server();
        let (name, value) = add_session_cookie(1, true);

        let response = server.post("/api/v1/products/embeddings").add_header(name, value).await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[sqlx::test]
    async fn test_product_crud_round_trip(pool: PgPool) {
        let server = create_test_server(pool.clone());
        let admin = create_test_employee(&pool, true).await;
        let (name, value) = add_session_cookie(admin.id, true);

        let response = server
            .post("/api/v1/products")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "name": "Brown Sugar Milk Tea",
                "product_type": "milk_tea",
                "price_cents": 625,
                "inventory": 12,
                "calories": 410
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: ProductResponse = response.json();
        assert_eq!(created.price.to_string(), "6.25");

        // Public read
        let response = server.get(&format!("/api/v1/products/{}", created.id)).await;
        response.assert_status_ok();

        let response = server
            .patch(&format!("/api/v1/products/{}/inventory", created.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"adjust": -20}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .patch(&format!("/api/v1/products/{}/inventory", created.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"adjust": -2}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<ProductResponse>().inventory, 10);

        let response = server
            .patch(&format!("/api/v1/products/{}", created.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"product_type": "special_item"}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<ProductResponse>().product_type, ProductType::SpecialItem);

        let response = server.get("/api/v1/products/by-category").await;
        response.assert_status_ok();
        let grouped: serde_json::Value = response.json();
        assert_eq!(grouped["special_item"][0]["name"], "Brown Sugar Milk Tea");

        let response = server
            .delete(&format!("/api/v1/products/{}", created.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server.get(&format!("/api/v1/products/{}", created.id)).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    async fn test_duplicate_name_conflicts(pool: PgPool) {
        let server = create_test_server(pool.clone());
        let admin = create_test_employee(&pool, true).await;
        let (name, value) = add_session_cookie(admin.id, true);
        let body = json!({"name": "Lychee Tea", "product_type": "fruit_tea", "price_cents": 500});

        server
            .post("/api/v1/products")
            .add_header(name.clone(), value.clone())
            .json(&body)
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/v1/products")
            .add_header(name, value)
            .json(&json!({"name": "lychee tea", "product_type": "fruit_tea", "price_cents": 450}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }
}
