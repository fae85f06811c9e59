//! Database models for employees.

use crate::api::models::employees::{EmployeeCreate, EmployeeUpdate};
use crate::types::EmployeeId;
use chrono::{DateTime, Utc};

/// Database request for creating a new employee
#[derive(Debug, Clone)]
pub struct EmployeeCreateDBRequest {
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<EmployeeCreate> for EmployeeCreateDBRequest {
    fn from(api: EmployeeCreate) -> Self {
        Self {
            name: api.name.trim().to_string(),
            email: normalize_email(&api.email),
            is_admin: api.is_admin,
        }
    }
}

/// Database request for updating an employee
#[derive(Debug, Clone, Default)]
pub struct EmployeeUpdateDBRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_admin: Option<bool>,
}

impl From<EmployeeUpdate> for EmployeeUpdateDBRequest {
    fn from(api: EmployeeUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_string()),
            email: api.email.as_deref().map(normalize_email),
            is_admin: api.is_admin,
        }
    }
}

/// Database response for an employee
#[derive(Debug, Clone)]
pub struct EmployeeDBResponse {
    pub id: EmployeeId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Emails are matched against Google's userinfo, which is case-insensitive in practice
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Cashier@Boba.Example "), "cashier@boba.example");
    }

    #[test]
    fn test_update_normalizes_email() {
        let update = EmployeeUpdateDBRequest::from(EmployeeUpdate {
            name: Some(" Sam ".to_string()),
            email: Some("SAM@Boba.Example".to_string()),
            is_admin: None,
        });
        assert_eq!(update.name.as_deref(), Some("Sam"));
        assert_eq!(update.email.as_deref(), Some("sam@boba.example"));
        assert_eq!(update.is_admin, None);
    }
}
