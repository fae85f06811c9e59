//! HTTP handlers for the manager dashboard reports.
//!
//! Days are business days in `reports.timezone`. Money is returned in dollars as strings.

use crate::{
    AppState,
    api::models::reports::{
        ProductUsageQuery, ProductUsageRow, ProductUsageTimeseriesRow, ReportDateQuery, SalesReportQuery, SalesReportRow,
        XReportResponse, ZReportResponse,
    },
    auth::current_user::RequiresAdmin,
    db::handlers::reports,
    errors::Result,
};
use axum::{
    Json,
    extract::{Query, State},
};

#[utoipa::path(
    get,
    path = "/reports/x",
    tag = "reports",
    summary = "X-report",
    description = "Hour-by-hour register activity for one day: order counts, sales by payment type, returns, voids and discards. All 24 hours are listed.",
    params(ReportDateQuery),
    responses(
        (status = 200, description = "Hourly totals", body = XReportResponse),
        (status = 400, description = "Missing or invalid date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn x_report(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Query(query): Query<ReportDateQuery>,
) -> Result<Json<XReportResponse>> {
    let report = reports::x_report(&state.db, query.date, &state.config.reports.timezone).await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/reports/z",
    tag = "reports",
    summary = "Z-report",
    description = "End-of-day totals with net sales (sales less returns, voids and discards) and sales tax.",
    params(ReportDateQuery),
    responses(
        (status = 200, description = "Day totals", body = ZReportResponse),
        (status = 400, description = "Missing or invalid date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn z_report(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Query(query): Query<ReportDateQuery>,
) -> Result<Json<ZReportResponse>> {
    let settings = &state.config.reports;
    let report = reports::z_report(&state.db, query.date, &settings.timezone, settings.sales_tax_rate).await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/reports/sales",
    tag = "reports",
    summary = "Sales by product",
    description = "Sales per product between two days (inclusive), best sellers first.",
    params(SalesReportQuery),
    responses(
        (status = 200, description = "One row per product sold", body = Vec<SalesReportRow>),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn sales_report(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Query(query): Query<SalesReportQuery>,
) -> Result<Json<Vec<SalesReportRow>>> {
    query.validate()?;
    let rows = reports::sales_report(&state.db, query.start, query.end, query.category, &state.config.reports.timezone).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/reports/product-usage",
    tag = "reports",
    summary = "Product usage",
    description = "Units sold or discarded per product between two days, within an hour-of-day window `[start_hour, end_hour)`.",
    params(ProductUsageQuery),
    responses(
        (status = 200, description = "Units per product, most used first", body = Vec<ProductUsageRow>),
        (status = 400, description = "Invalid date range or hours"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn product_usage(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Query(query): Query<ProductUsageQuery>,
) -> Result<Json<Vec<ProductUsageRow>>> {
    query.validate()?;
    let (start_hour, end_hour) = query.hours();
    let rows = reports::product_usage(
        &state.db,
        query.start_date,
        query.end_date,
        start_hour,
        end_hour,
        &state.config.reports.timezone,
    )
    .await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/reports/product-usage/timeseries",
    tag = "reports",
    summary = "Product usage by hour",
    description = "Like product usage, broken down by hour of day.",
    params(ProductUsageQuery),
    responses(
        (status = 200, description = "One row per hour in the window", body = Vec<ProductUsageTimeseriesRow>),
        (status = 400, description = "Invalid date range or hours"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin required"),
        (status = 500, description = "Internal server error"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn product_usage_timeseries(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Query(query): Query<ProductUsageQuery>,
) -> Result<Json<Vec<ProductUsageTimeseriesRow>>> {
    query.validate()?;
    let (start_hour, end_hour) = query.hours();
    let rows = reports::product_usage_timeseries(
        &state.db,
        query.start_date,
        query.end_date,
        start_hour,
        end_hour,
        &state.config.reports.timezone,
    )
    .await?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            products::ProductResponse,
            reports::{ProductUsageRow, XReportResponse, ZReportResponse},
        },
        test_utils::{add_session_cookie, create_test_employee, create_test_server, lazy_test_server},
    };
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;
    use sqlx::PgPool;

    #[tokio::test]
    async fn test_reports_are_admin_only() {
        let server = lazy_test_server();
        server.get("/api/v1/reports/z?date=2025-03-01").await.assert_status(StatusCode::UNAUTHORIZED);

        let (name, value) = add_session_cookie(2, false);
        server
            .get("/api/v1/reports/z?date=2025-03-01")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_report_parameters_are_validated() {
        let server = lazy_test_server();
        let (name, value) = add_session_cookie(1, true);

        for uri in [
            "/api/v1/reports/x",
            "/api/v1/reports/x?date=yesterday",
            "/api/v1/reports/sales?start=2025-03-05&end=2025-03-01",
            "/api/v1/reports/product-usage?start_date=2025-03-01&end_date=2025-03-02&start_hour=18&end_hour=9",
            "/api/v1/reports/product-usage/timeseries?start_date=2025-03-01&end_date=2025-03-02&end_hour=25",
        ] {
            let response = server.get(uri).add_header(name.clone(), value.clone()).await;
            assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[sqlx::test]
    async fn test_reports_reflect_recorded_transactions(pool: PgPool) {
        let server = create_test_server(pool.clone());
        let admin = create_test_employee(&pool, true).await;
        let (name, value) = add_session_cookie(admin.id, true);

        let tea: ProductResponse = server
            .post("/api/v1/products")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Wintermelon Tea", "product_type": "brewed_tea", "price_cents": 500, "inventory": 50}))
            .await
            .json();

        for (payment, kind, qty) in [
            ("cash", "sale", 2),
            ("card", "sale", 1),
            ("cash", "return", 1),
            ("cash", "discard", 1),
            ("card", "void", 1),
        ] {
            server
                .post("/api/v1/transactions")
                .add_header(name.clone(), value.clone())
                .json(&json!({
                    "payment_type": payment,
                    "transaction_type": kind,
                    "items": [{"product_id": tea.id, "quantity": qty}]
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let today = Utc::now().date_naive();

        let z: ZReportResponse = server
            .get(&format!("/api/v1/reports/z?date={today}"))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        // Gross covers all five transactions; net takes the return, void and discard back off
        assert_eq!(z.total_transactions, 5);
        assert_eq!(z.gross_sales.to_string(), "30.00");
        assert_eq!(z.cash.to_string(), "20.00");
        assert_eq!(z.card.to_string(), "10.00");
        assert_eq!(z.returns.to_string(), "5.00");
        assert_eq!(z.voids.to_string(), "5.00");
        assert_eq!(z.discards.to_string(), "5.00");
        assert_eq!(z.net_sales.to_string(), "15.00");
        // 15.00 * 0.0825 = 1.2375 -> 1.24
        assert_eq!(z.tax.to_string(), "1.24");
        assert_eq!(z.total_with_tax.to_string(), "16.24");

        let x: XReportResponse = server
            .get(&format!("/api/v1/reports/x?date={today}"))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(x.hours.len(), 24);
        assert_eq!(x.hours.iter().map(|h| h.orders).sum::<i64>(), 5);
        assert_eq!(x.hours.iter().map(|h| h.sales).sum::<rust_decimal::Decimal>(), rust_decimal::Decimal::new(3_000, 2));

        let usage: Vec<ProductUsageRow> = server
            .get(&format!("/api/v1/reports/product-usage?start_date={today}&end_date={today}"))
            .add_header(name, value)
            .await
            .json();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].units, 4, "sales and discards count as usage");
    }
}
