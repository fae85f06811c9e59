//! Common type definitions shared by the API and database layers.
//!
//! # ID Types
//!
//! Every table uses a `SERIAL` primary key, so entity IDs are `i32` aliases:
//!
//! - [`ProductId`]: Menu item identifier
//! - [`AllergenId`]: Allergen identifier
//! - [`EmployeeId`]: Staff member identifier
//! - [`TransactionId`]: Recorded order identifier
//!
//! # Operations
//!
//! [`Operation`] names the kind of action a caller attempted. It is used in
//! permission errors so that the rejected action can be reported to the client.

use rust_decimal::Decimal;
use std::fmt;

pub type ProductId = i32;
pub type AllergenId = i32;
pub type EmployeeId = i32;
pub type TransactionId = i32;

/// Kinds of actions performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Format a cent amount as a dollar string for log lines, e.g. `1250` -> `"$12.50"`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

/// Convert an integer cent amount into a two-decimal dollar value, e.g. `1250` -> `12.50`
pub fn cents_to_dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
