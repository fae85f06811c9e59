//! HTTP handlers for staff administration.
//!
//! Only admins manage employees. Adding an employee row is what allows a Google account with that
//! email to sign in.

use crate::{
    AppState,
    api::models::{
        employees::{EmployeeCreate, EmployeeResponse, EmployeeUpdate, ListEmployeesQuery},
        pagination::PaginatedResponse,
    },
    auth::current_user::RequiresAdmin,
    db::{
        errors::DbError,
        handlers::{Employees, Repository, employees::EmployeeFilter},
        models::employees::{EmployeeCreateDBRequest, EmployeeUpdateDBRequest},
    },
    errors::{Error, Result},
    types::EmployeeId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

fn not_found(id: EmployeeId) -> Error {
    Error::NotFound {
        resource: "Employee".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/employees",
    tag = "employees",
    summary = "List employees",
    params(ListEmployeesQuery),
    responses(
        (status = 200, description = "Page of employees ordered by name", body = PaginatedResponse<EmployeeResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<ListEmployeesQuery>,
    _: RequiresAdmin,
) -> Result<Json<PaginatedResponse<EmployeeResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = EmployeeFilter::new(skip, limit).with_is_admin(query.is_admin);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Employees::new(&mut conn);
    let employees = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        employees.into_iter().map(Into::into).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    get,
    path = "/employees/{id}",
    tag = "employees",
    summary = "Get an employee",
    params(("id" = i32, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee", body = EmployeeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<EmployeeId>,
    _: RequiresAdmin,
) -> Result<Json<EmployeeResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let employee = Employees::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(employee.into()))
}

#[utoipa::path(
    post,
    path = "/employees",
    tag = "employees",
    summary = "Add an employee",
    request_body = EmployeeCreate,
    responses(
        (status = 201, description = "Employee created", body = EmployeeResponse),
        (status = 400, description = "Invalid name or email"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 409, description = "Email already in use"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_employee(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Json(data): Json<EmployeeCreate>,
) -> Result<(StatusCode, Json<EmployeeResponse>)> {
    data.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let employee = Employees::new(&mut conn).create(&EmployeeCreateDBRequest::from(data)).await?;
    Ok((StatusCode::CREATED, Json(employee.into())))
}

#[utoipa::path(
    patch,
    path = "/employees/{id}",
    tag = "employees",
    summary = "Update an employee",
    params(("id" = i32, Path, description = "Employee ID")),
    request_body = EmployeeUpdate,
    responses(
        (status = 200, description = "Employee updated", body = EmployeeResponse),
        (status = 400, description = "Invalid name or email"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Email already in use, or an admin removing their own admin flag"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<EmployeeId>,
    RequiresAdmin(current): RequiresAdmin,
    Json(data): Json<EmployeeUpdate>,
) -> Result<Json<EmployeeResponse>> {
    data.validate()?;
    if id == current.id && data.is_admin == Some(false) {
        return Err(Error::Conflict {
            message: "You cannot remove your own admin access".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let employee = Employees::new(&mut conn)
        .update(id, &EmployeeUpdateDBRequest::from(data))
        .await
        .map_err(|e| match e {
            DbError::NotFound => not_found(id),
            other => other.into(),
        })?;
    Ok(Json(employee.into()))
}

#[utoipa::path(
    delete,
    path = "/employees/{id}",
    tag = "employees",
    summary = "Remove an employee",
    params(("id" = i32, Path, description = "Employee ID")),
    responses(
        (status = 204, description = "Employee deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Deleting yourself, or the employee has recorded transactions"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<EmployeeId>,
    RequiresAdmin(current): RequiresAdmin,
) -> Result<StatusCode> {
    if id == current.id {
        return Err(Error::Conflict {
            message: "You cannot delete your own account".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Employees::new(&mut conn).delete(id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(not_found(id)),
        Err(DbError::ForeignKeyViolation { .. }) => Err(Error::Conflict {
            message: "Employee has recorded transactions and cannot be deleted".to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}
