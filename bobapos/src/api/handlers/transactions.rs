//! HTTP handlers for register transactions.

use crate::{
    AppState,
    api::models::{
        auth::CurrentEmployee,
        pagination::PaginatedResponse,
        transactions::{ListTransactionsQuery, TransactionCreate, TransactionResponse},
    },
    auth::current_user::RequiresAdmin,
    db::handlers::{Transactions, transactions::TransactionFilter},
    errors::{Error, Result},
    types::TransactionId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

fn not_found(id: TransactionId) -> Error {
    Error::NotFound {
        resource: "Transaction".to_string(),
        id: id.to_string(),
    }
}

/// Record a transaction
#[utoipa::path(
    post,
    path = "/transactions",
    tag = "transactions",
    summary = "Record a transaction",
    description = "Prices each line from the current menu, stores the order and adjusts stock. Sales and \
                   discards take stock out, returns put it back, voids leave it alone. Lines for the same \
                   product are merged.",
    request_body = TransactionCreate,
    responses(
        (status = 201, description = "Transaction recorded", body = TransactionResponse),
        (status = 400, description = "Empty order, bad quantity, unknown product or not enough stock"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_transaction(
    State(state): State<AppState>,
    employee: CurrentEmployee,
    Json(data): Json<TransactionCreate>,
) -> Result<(StatusCode, Json<TransactionResponse>)> {
    data.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let transaction = Transactions::new(&mut conn)
        .create(&data.into_db_request(employee.id))
        .await?;

    Ok((StatusCode::CREATED, Json(transaction.into())))
}

#[utoipa::path(
    get,
    path = "/transactions/{id}",
    tag = "transactions",
    summary = "Get a transaction",
    params(("id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction with its line items", body = TransactionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Transaction not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<TransactionId>,
    _: CurrentEmployee,
) -> Result<Json<TransactionResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let transaction = Transactions::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(transaction.into()))
}

#[utoipa::path(
    get,
    path = "/transactions",
    tag = "transactions",
    summary = "List transactions",
    description = "Newest first.",
    params(ListTransactionsQuery),
    responses(
        (status = 200, description = "Page of transactions", body = PaginatedResponse<TransactionResponse>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
    _: CurrentEmployee,
) -> Result<Json<PaginatedResponse<TransactionResponse>>> {
    if let (Some(from), Some(to)) = (query.from, query.to)
        && from > to
    {
        return Err(Error::BadRequest {
            message: format!("from ({from}) must not be after to ({to})"),
        });
    }

    let (skip, limit) = query.pagination.params();
    let filter = TransactionFilter {
        employee_id: query.employee_id,
        payment_type: query.payment_type,
        transaction_type: query.transaction_type,
        from: query.from,
        to: query.to,
        ..TransactionFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Transactions::new(&mut conn);
    let transactions = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        transactions.into_iter().map(Into::into).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    delete,
    path = "/transactions/{id}",
    tag = "transactions",
    summary = "Delete a transaction",
    description = "Removes a mistaken record. Stock is not restored; ring up a return or void for that.",
    params(("id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 204, description = "Transaction deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Transaction not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<TransactionId>,
    _: RequiresAdmin,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Transactions::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
