//! Database repository for employees.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::employees::{EmployeeCreateDBRequest, EmployeeDBResponse, EmployeeUpdateDBRequest, normalize_email},
};
use crate::types::EmployeeId;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, QueryBuilder};
use tracing::instrument;

/// Filter for listing employees
#[derive(Debug, Clone)]
pub struct EmployeeFilter {
    pub skip: i64,
    pub limit: i64,
    pub is_admin: Option<bool>,
}

impl EmployeeFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            is_admin: None,
        }
    }

    pub fn with_is_admin(mut self, is_admin: Option<bool>) -> Self {
        self.is_admin = is_admin;
        self
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Employee> for EmployeeDBResponse {
    fn from(e: Employee) -> Self {
        Self {
            id: e.id,
            name: e.name,
            email: e.email,
            is_admin: e.is_admin,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

pub struct Employees<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Employees<'c> {
    type CreateRequest = EmployeeCreateDBRequest;
    type UpdateRequest = EmployeeUpdateDBRequest;
    type Response = EmployeeDBResponse;
    type Id = EmployeeId;
    type Filter = EmployeeFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let employee = sqlx::query_as::<_, Employee>(
            r#"
            INSERT INTO employees (name, email, is_admin)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .bind(request.is_admin)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(employee.into())
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let employee = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(employee.map(Into::into))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let employees = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(employees.into_iter().map(|e| (e.id, e.into())).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM employees WHERE 1=1");

        if let Some(is_admin) = filter.is_admin {
            query.push(" AND is_admin = ");
            query.push_bind(is_admin);
        }

        query.push(" ORDER BY name ASC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let employees = query.build_query_as::<Employee>().fetch_all(&mut *self.db).await?;

        Ok(employees.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let employee = sqlx::query_as::<_, Employee>(
            r#"
            UPDATE employees SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                is_admin = COALESCE($4, is_admin),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(request.is_admin)
        .fetch_optional(&mut *self.db)
        .await?;

        employee.map(Into::into).ok_or(DbError::NotFound)
    }
}

impl<'c> Employees<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Count employees matching the filter, ignoring pagination
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &EmployeeFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM employees WHERE 1=1");

        if let Some(is_admin) = filter.is_admin {
            query.push(" AND is_admin = ");
            query.push_bind(is_admin);
        }

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// Look up an employee by email, case-insensitively
    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<EmployeeDBResponse>> {
        let employee = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(employee.map(Into::into))
    }

    /// Make sure an admin employee exists for `email`, promoting an existing row if needed.
    ///
    /// Safe to call on every startup.
    #[instrument(skip(self), err)]
    pub async fn ensure_admin(&mut self, email: &str, name: &str) -> Result<EmployeeDBResponse> {
        let employee = sqlx::query_as::<_, Employee>(
            r#"
            INSERT INTO employees (name, email, is_admin)
            VALUES ($1, $2, TRUE)
            ON CONFLICT ON CONSTRAINT employees_email_unique
            DO UPDATE SET is_admin = TRUE, updated_at = CASE WHEN employees.is_admin THEN employees.updated_at ELSE NOW() END
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(normalize_email(email))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(employee.into())
    }
}
