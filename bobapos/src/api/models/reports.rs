//! API models for the X, Z, sales and product-usage reports.
//!
//! Money is aggregated in integer cents and converted to dollars (`Decimal`, two places, serialized
//! as strings) only when the response is built.

use crate::{
    db::models::products::ProductType,
    errors::{Error, Result},
    types::ProductId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

/// A single business day, in the configured report time zone
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ReportDateQuery {
    /// Business day, `YYYY-MM-DD`
    #[param(value_type = String, format = Date)]
    pub date: NaiveDate,
}

/// Inclusive range of business days
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SalesReportQuery {
    #[param(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[param(value_type = String, format = Date)]
    pub end: NaiveDate,
    /// Only products of this category
    pub category: Option<ProductType>,
}

impl SalesReportQuery {
    pub fn validate(&self) -> Result<()> {
        validate_date_range(self.start, self.end)
    }
}

/// Day range plus an hour-of-day window `[start_hour, end_hour)`
#[serde_as]
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ProductUsageQuery {
    #[param(value_type = String, format = Date)]
    pub start_date: NaiveDate,
    #[param(value_type = String, format = Date)]
    pub end_date: NaiveDate,
    /// First hour included, 0-23 (default 0)
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    #[param(value_type = Option<i32>, minimum = 0, maximum = 23)]
    pub start_hour: Option<i32>,
    /// First hour excluded, 1-24 (default 24)
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    #[param(value_type = Option<i32>, minimum = 1, maximum = 24)]
    pub end_hour: Option<i32>,
}

impl ProductUsageQuery {
    pub fn hours(&self) -> (i32, i32) {
        (self.start_hour.unwrap_or(0), self.end_hour.unwrap_or(24))
    }

    pub fn validate(&self) -> Result<()> {
        validate_date_range(self.start_date, self.end_date)?;

        let (start_hour, end_hour) = self.hours();
        if !(0..=24).contains(&start_hour) || !(0..=24).contains(&end_hour) {
            return Err(Error::BadRequest {
                message: "Hours must be between 0 and 24".to_string(),
            });
        }
        if start_hour >= end_hour {
            return Err(Error::BadRequest {
                message: format!("start_hour ({start_hour}) must be before end_hour ({end_hour})"),
            });
        }
        Ok(())
    }
}

fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(Error::BadRequest {
            message: format!("Start date {start} is after end date {end}"),
        });
    }
    Ok(())
}

/// One hour of the X-report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct XReportHour {
    /// Hour of day, 0-23
    pub hour: i32,
    /// Number of transactions of every type
    pub orders: i64,
    /// Total of every transaction in the hour
    #[schema(value_type = String)]
    pub sales: Decimal,
    #[schema(value_type = String)]
    pub cash: Decimal,
    #[schema(value_type = String)]
    pub card: Decimal,
    #[schema(value_type = String)]
    pub check: Decimal,
    #[schema(value_type = String)]
    pub gift_card: Decimal,
    #[schema(value_type = String)]
    pub returns: Decimal,
    #[schema(value_type = String)]
    pub voids: Decimal,
    #[schema(value_type = String)]
    pub discards: Decimal,
}

/// Hour-by-hour activity for one business day
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct XReportResponse {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub timezone: String,
    /// All 24 hours, in order
    pub hours: Vec<XReportHour>,
}

/// End-of-day totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ZReportResponse {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub timezone: String,
    /// Number of transactions of every type
    pub total_transactions: i64,
    /// Total of every transaction of the day, whatever its type
    #[schema(value_type = String)]
    pub gross_sales: Decimal,
    #[schema(value_type = String)]
    pub cash: Decimal,
    #[schema(value_type = String)]
    pub card: Decimal,
    #[schema(value_type = String)]
    pub check: Decimal,
    #[schema(value_type = String)]
    pub gift_card: Decimal,
    #[schema(value_type = String)]
    pub returns: Decimal,
    #[schema(value_type = String)]
    pub voids: Decimal,
    #[schema(value_type = String)]
    pub discards: Decimal,
    /// Gross sales less returns, voids and discards
    #[schema(value_type = String)]
    pub net_sales: Decimal,
    #[schema(value_type = String)]
    pub tax_rate: Decimal,
    /// Net sales times the tax rate, rounded to cents
    #[schema(value_type = String)]
    pub tax: Decimal,
    #[schema(value_type = String)]
    pub total_with_tax: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalesReportRow {
    pub product_id: ProductId,
    pub product_name: String,
    pub category: ProductType,
    /// Number of distinct sales containing the product
    pub total_orders: i64,
    pub units_sold: i64,
    #[schema(value_type = String)]
    pub total_sales: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductUsageRow {
    pub product_id: ProductId,
    pub product_name: String,
    /// Units sold or discarded in the window
    pub units: i64,
}

/// Units used per product within one hour of day, summed over the date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductUsageTimeseriesRow {
    pub hour: i32,
    /// Product name to units
    pub products: BTreeMap<String, i64>,
}
