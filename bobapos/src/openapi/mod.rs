//! OpenAPI documentation.
//!
//! [`ApiDoc`] covers the whole HTTP surface: staff sign-in at `/authentication/*` and the POS API
//! nested under `/api/v1`. It is served as JSON at `/api/openapi.json` and rendered with Scalar at
//! `/api/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{api, db};

/// Session cookie security scheme, named after the default cookie.
struct CookieSecurityAddon;

impl Modify for CookieSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.security_schemes.insert(
            "CookieAuth".to_string(),
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "bobapos_session",
                "Session cookie set by the Google sign-in callback. Open `/authentication/google` in a browser to sign in.",
            ))),
        );
    }
}

/// Menu, orders, staff, reports and chat, relative to `/api/v1`.
#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::products::list_products,
        api::handlers::products::list_products_by_category,
        api::handlers::products::get_product,
        api::handlers::products::create_product,
        api::handlers::products::update_product,
        api::handlers::products::delete_product,
        api::handlers::products::update_inventory,
        api::handlers::products::update_price,
        api::handlers::products::embed_products,
        api::handlers::allergens::list_allergens,
        api::handlers::allergens::get_allergen,
        api::handlers::allergens::create_allergen,
        api::handlers::allergens::update_allergen,
        api::handlers::allergens::delete_allergen,
        api::handlers::employees::list_employees,
        api::handlers::employees::get_employee,
        api::handlers::employees::create_employee,
        api::handlers::employees::update_employee,
        api::handlers::employees::delete_employee,
        api::handlers::transactions::create_transaction,
        api::handlers::transactions::get_transaction,
        api::handlers::transactions::list_transactions,
        api::handlers::transactions::delete_transaction,
        api::handlers::reports::x_report,
        api::handlers::reports::z_report,
        api::handlers::reports::sales_report,
        api::handlers::reports::product_usage,
        api::handlers::reports::product_usage_timeseries,
        api::handlers::chat::chat,
    ),
    components(
        schemas(
            db::models::products::ProductType,
            db::models::products::InventoryChange,
            db::models::transactions::PaymentType,
            db::models::transactions::TransactionType,
            api::models::products::ProductCreate,
            api::models::products::ProductUpdate,
            api::models::products::InventoryUpdate,
            api::models::products::PriceUpdate,
            api::models::products::ProductResponse,
            api::models::products::EmbedProductsResponse,
            api::models::allergens::AllergenCreate,
            api::models::allergens::AllergenUpdate,
            api::models::allergens::AllergenResponse,
            api::models::employees::EmployeeCreate,
            api::models::employees::EmployeeUpdate,
            api::models::employees::EmployeeResponse,
            api::models::transactions::TransactionItemCreate,
            api::models::transactions::TransactionCreate,
            api::models::transactions::TransactionItemResponse,
            api::models::transactions::TransactionResponse,
            api::models::reports::XReportHour,
            api::models::reports::XReportResponse,
            api::models::reports::ZReportResponse,
            api::models::reports::SalesReportRow,
            api::models::reports::ProductUsageRow,
            api::models::reports::ProductUsageTimeseriesRow,
            api::models::chat::ChatRequest,
            api::models::chat::ChatResponse,
            api::models::chat::Recommendation,
        )
    ),
)]
pub struct PosApiDoc;

#[derive(OpenApi)]
#[openapi(
    modifiers(&CookieSecurityAddon),
    nest(
        (path = "/api/v1", api = PosApiDoc)
    ),
    paths(
        api::handlers::auth::google_login,
        api::handlers::auth::google_callback,
        api::handlers::auth::logout,
        api::handlers::auth::me,
    ),
    components(
        schemas(
            api::models::auth::CurrentEmployee,
            api::models::auth::AuthSuccessResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Staff sign-in with Google. Only accounts whose email matches an employee can sign in."),
        (name = "products", description = "The menu: drinks, toppings and other items, with stock levels and allergens."),
        (name = "allergens", description = "Allergens that products can be tagged with."),
        (name = "employees", description = "Staff accounts. Admins manage the menu, staff and reports."),
        (name = "transactions", description = "Orders rung up at the register. Prices are integer cents; responses also carry dollar amounts."),
        (name = "reports", description = "Manager reports. Days and hours are bucketed in the configured reporting time zone."),
        (name = "chat", description = "Customer-facing drink recommendations grounded in the current menu."),
    ),
    info(
        title = "Boba POS API",
        version = "1.0.0",
        description = "Point-of-sale backend for a boba tea shop.

## Authentication

Staff endpoints need the `bobapos_session` cookie, which is set after signing in with Google at
`/authentication/google`. Menu reads and the chatbot are public.

## Errors

Errors are returned as plain text with a matching HTTP status code. Duplicate names and emails
return `409` with a JSON body naming the clashing resource:

```json
{\"message\": \"An employee with this email address already exists\", \"resource\": \"employee\"}
```",
    ),
)]
pub struct ApiDoc;
