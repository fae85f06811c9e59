//! API request/response models for employees.

use super::pagination::Pagination;
use crate::{
    db::models::employees::EmployeeDBResponse,
    errors::{Error, Result},
    types::EmployeeId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeCreate {
    pub name: String,
    /// Must match the Google account the employee signs in with
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl EmployeeCreate {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_admin: Option<bool>,
}

impl EmployeeUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            validate_name(name)?;
        }
        if let Some(ref email) = self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

/// Query parameters for listing employees
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListEmployeesQuery {
    /// Only admins (`true`) or only non-admins (`false`)
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    #[param(value_type = Option<bool>)]
    pub is_admin: Option<bool>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeResponse {
    pub id: EmployeeId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmployeeDBResponse> for EmployeeResponse {
    fn from(db: EmployeeDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            is_admin: db.is_admin,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Employee name cannot be empty".to_string(),
        });
    }
    Ok(())
}

/// Light sanity check: one `@`, something on both sides, a dot in the domain
fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(Error::BadRequest {
            message: format!("Invalid email address: {email}"),
        });
    }
    Ok(())
}
