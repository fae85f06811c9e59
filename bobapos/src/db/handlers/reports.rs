//! Aggregation queries behind the X, Z, sales and product-usage reports.
//!
//! Every query buckets `transactions.created_at` into business days and hours using the
//! configured report time zone (`created_at AT TIME ZONE $tz`). Sums are taken over integer
//! cents and only turned into dollars at the end.
//!
//! Register totals (gross, per payment type, transaction counts) cover every transaction type.
//! Net sales is gross less the return, void and discard totals.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use tracing::instrument;

use crate::{
    api::models::reports::{
        ProductUsageRow, ProductUsageTimeseriesRow, SalesReportRow, XReportHour, XReportResponse, ZReportResponse,
    },
    db::{errors::Result, models::products::ProductType},
    types::{ProductId, cents_to_dollars},
};

/// Per-type totals, shared by the hourly X-report rows and the daily Z-report
#[derive(Debug, Clone, Default, FromRow)]
struct RegisterTotalsRow {
    pub transactions: i64,
    pub gross_cents: i64,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub check_cents: i64,
    pub gift_card_cents: i64,
    pub returns_cents: i64,
    pub voids_cents: i64,
    pub discards_cents: i64,
}

#[derive(Debug, Clone, FromRow)]
struct HourlyTotalsRow {
    pub hour: i32,
    #[sqlx(flatten)]
    pub totals: RegisterTotalsRow,
}

#[derive(Debug, Clone, FromRow)]
struct SalesRow {
    pub product_id: ProductId,
    pub product_name: String,
    pub category: ProductType,
    pub total_orders: i64,
    pub units_sold: i64,
    pub sales_cents: i64,
}

#[derive(Debug, Clone, FromRow)]
struct UsageRow {
    pub product_id: ProductId,
    pub product_name: String,
    pub units: i64,
}

#[derive(Debug, Clone, FromRow)]
struct HourlyUsageRow {
    pub hour: i32,
    pub product_name: String,
    pub units: i64,
}

const REGISTER_TOTALS: &str = r#"
    COUNT(t.id)::BIGINT AS transactions,
    COALESCE(SUM(t.total_cents), 0)::BIGINT AS gross_cents,
    COALESCE(SUM(t.total_cents) FILTER (WHERE t.payment_type = 'cash'), 0)::BIGINT AS cash_cents,
    COALESCE(SUM(t.total_cents) FILTER (WHERE t.payment_type = 'card'), 0)::BIGINT AS card_cents,
    COALESCE(SUM(t.total_cents) FILTER (WHERE t.payment_type = 'check'), 0)::BIGINT AS check_cents,
    COALESCE(SUM(t.total_cents) FILTER (WHERE t.payment_type = 'gift_card'), 0)::BIGINT AS gift_card_cents,
    COALESCE(SUM(t.total_cents) FILTER (WHERE t.transaction_type = 'return'), 0)::BIGINT AS returns_cents,
    COALESCE(SUM(t.total_cents) FILTER (WHERE t.transaction_type = 'void'), 0)::BIGINT AS voids_cents,
    COALESCE(SUM(t.total_cents) FILTER (WHERE t.transaction_type = 'discard'), 0)::BIGINT AS discards_cents
"#;

/// Hour-by-hour register activity for one business day. Always returns 24 rows.
#[instrument(skip(db), err)]
pub async fn x_report(db: &PgPool, date: NaiveDate, timezone: &str) -> Result<XReportResponse> {
    let rows = sqlx::query_as::<_, HourlyTotalsRow>(&format!(
        r#"
        SELECT h.hour, {REGISTER_TOTALS}
        FROM generate_series(0, 23) AS h(hour)
        LEFT JOIN transactions t
            ON (t.created_at AT TIME ZONE $2)::DATE = $1
            AND EXTRACT(HOUR FROM t.created_at AT TIME ZONE $2)::INTEGER = h.hour
        GROUP BY h.hour
        ORDER BY h.hour
        "#
    ))
    .bind(date)
    .bind(timezone)
    .fetch_all(db)
    .await?;

    let hours = rows
        .into_iter()
        .map(|row| {
            let t = row.totals;
            XReportHour {
                hour: row.hour,
                orders: t.transactions,
                sales: cents_to_dollars(t.gross_cents),
                cash: cents_to_dollars(t.cash_cents),
                card: cents_to_dollars(t.card_cents),
                check: cents_to_dollars(t.check_cents),
                gift_card: cents_to_dollars(t.gift_card_cents),
                returns: cents_to_dollars(t.returns_cents),
                voids: cents_to_dollars(t.voids_cents),
                discards: cents_to_dollars(t.discards_cents),
            }
        })
        .collect();

    Ok(XReportResponse {
        date,
        timezone: timezone.to_string(),
        hours,
    })
}

/// End-of-day totals with tax applied to net sales
#[instrument(skip(db), err)]
pub async fn z_report(db: &PgPool, date: NaiveDate, timezone: &str, tax_rate: Decimal) -> Result<ZReportResponse> {
    let totals = sqlx::query_as::<_, RegisterTotalsRow>(&format!(
        r#"
        SELECT {REGISTER_TOTALS}
        FROM transactions t
        WHERE (t.created_at AT TIME ZONE $2)::DATE = $1
        "#
    ))
    .bind(date)
    .bind(timezone)
    .fetch_one(db)
    .await?;

    Ok(build_z_report(date, timezone, tax_rate, &totals))
}

fn build_z_report(date: NaiveDate, timezone: &str, tax_rate: Decimal, t: &RegisterTotalsRow) -> ZReportResponse {
    let net_cents = t.gross_cents - t.returns_cents - t.voids_cents - t.discards_cents;
    let net_sales = cents_to_dollars(net_cents);
    let tax = to_cents_scale((net_sales * tax_rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero));

    ZReportResponse {
        date,
        timezone: timezone.to_string(),
        total_transactions: t.transactions,
        gross_sales: cents_to_dollars(t.gross_cents),
        cash: cents_to_dollars(t.cash_cents),
        card: cents_to_dollars(t.card_cents),
        check: cents_to_dollars(t.check_cents),
        gift_card: cents_to_dollars(t.gift_card_cents),
        returns: cents_to_dollars(t.returns_cents),
        voids: cents_to_dollars(t.voids_cents),
        discards: cents_to_dollars(t.discards_cents),
        net_sales,
        tax_rate,
        tax,
        total_with_tax: to_cents_scale(net_sales + tax),
    }
}

/// Pin a dollar amount to two decimal places; rounding a zero product drops the scale
fn to_cents_scale(mut amount: Decimal) -> Decimal {
    amount.rescale(2);
    amount
}

/// Per-product sales over an inclusive range of business days, best sellers first
#[instrument(skip(db), err)]
pub async fn sales_report(
    db: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
    category: Option<ProductType>,
    timezone: &str,
) -> Result<Vec<SalesReportRow>> {
    let rows = sqlx::query_as::<_, SalesRow>(
        r#"
        SELECT
            p.id AS product_id,
            p.name AS product_name,
            p.product_type AS category,
            COUNT(DISTINCT t.id)::BIGINT AS total_orders,
            COALESCE(SUM(ti.quantity), 0)::BIGINT AS units_sold,
            COALESCE(SUM(ti.subtotal_cents), 0)::BIGINT AS sales_cents
        FROM transaction_items ti
        JOIN transactions t ON t.id = ti.transaction_id
        JOIN products p ON p.id = ti.product_id
        WHERE t.transaction_type = 'sale'
          AND (t.created_at AT TIME ZONE $3)::DATE BETWEEN $1 AND $2
          AND ($4::product_type IS NULL OR p.product_type = $4)
        GROUP BY p.id, p.name, p.product_type
        ORDER BY sales_cents DESC, p.name ASC
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(timezone)
    .bind(category)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| SalesReportRow {
            product_id: r.product_id,
            product_name: r.product_name,
            category: r.category,
            total_orders: r.total_orders,
            units_sold: r.units_sold,
            total_sales: cents_to_dollars(r.sales_cents),
        })
        .collect())
}

// Sales and discards both consume stock; returns and voids don't
const USAGE_WHERE: &str = r#"
    t.transaction_type IN ('sale', 'discard')
    AND (t.created_at AT TIME ZONE $3)::DATE BETWEEN $1 AND $2
    AND EXTRACT(HOUR FROM t.created_at AT TIME ZONE $3)::INTEGER >= $4
    AND EXTRACT(HOUR FROM t.created_at AT TIME ZONE $3)::INTEGER < $5
"#;

/// Units used per product within `[start_hour, end_hour)` on each day of the range
#[instrument(skip(db), err)]
pub async fn product_usage(
    db: &PgPool,
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_hour: i32,
    end_hour: i32,
    timezone: &str,
) -> Result<Vec<ProductUsageRow>> {
    let rows = sqlx::query_as::<_, UsageRow>(&format!(
        r#"
        SELECT p.id AS product_id, p.name AS product_name, SUM(ti.quantity)::BIGINT AS units
        FROM transaction_items ti
        JOIN transactions t ON t.id = ti.transaction_id
        JOIN products p ON p.id = ti.product_id
        WHERE {USAGE_WHERE}
        GROUP BY p.id, p.name
        ORDER BY units DESC, p.name ASC
        "#
    ))
    .bind(start_date)
    .bind(end_date)
    .bind(timezone)
    .bind(start_hour)
    .bind(end_hour)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ProductUsageRow {
            product_id: r.product_id,
            product_name: r.product_name,
            units: r.units,
        })
        .collect())
}

/// Like [`product_usage`], split by hour of day. Every hour in the window gets a row, empty or not.
#[instrument(skip(db), err)]
pub async fn product_usage_timeseries(
    db: &PgPool,
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_hour: i32,
    end_hour: i32,
    timezone: &str,
) -> Result<Vec<ProductUsageTimeseriesRow>> {
    let rows = sqlx::query_as::<_, HourlyUsageRow>(&format!(
        r#"
        SELECT EXTRACT(HOUR FROM t.created_at AT TIME ZONE $3)::INTEGER AS hour,
               p.name AS product_name,
               SUM(ti.quantity)::BIGINT AS units
        FROM transaction_items ti
        JOIN transactions t ON t.id = ti.transaction_id
        JOIN products p ON p.id = ti.product_id
        WHERE {USAGE_WHERE}
        GROUP BY 1, p.name
        ORDER BY 1, p.name
        "#
    ))
    .bind(start_date)
    .bind(end_date)
    .bind(timezone)
    .bind(start_hour)
    .bind(end_hour)
    .fetch_all(db)
    .await?;

    Ok(bucket_by_hour(start_hour, end_hour, rows))
}

fn bucket_by_hour(start_hour: i32, end_hour: i32, rows: Vec<HourlyUsageRow>) -> Vec<ProductUsageTimeseriesRow> {
    let mut hours: BTreeMap<i32, BTreeMap<String, i64>> = (start_hour..end_hour).map(|h| (h, BTreeMap::new())).collect();

    for row in rows {
        *hours.entry(row.hour).or_default().entry(row.product_name).or_insert(0) += row.units;
    }

    hours
        .into_iter()
        .map(|(hour, products)| ProductUsageTimeseriesRow { hour, products })
        .collect()
}
