//! Database repository for register transactions.
//!
//! Recording a transaction is the one multi-table write in the system: it prices every line from
//! the current menu, moves stock according to the transaction type and stores the header and its
//! lines, all inside a single database transaction with the affected product rows locked.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    models::transactions::{
        PaymentType, TransactionCreateDBRequest, TransactionDBResponse, TransactionItemDBResponse, TransactionType,
    },
};
use crate::types::{EmployeeId, ProductId, TransactionId, format_cents};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

/// Filter for listing transactions
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    pub employee_id: Option<EmployeeId>,
    pub payment_type: Option<PaymentType>,
    pub transaction_type: Option<TransactionType>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
    pub skip: i64,
    pub limit: i64,
}

impl TransactionFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            employee_id: None,
            payment_type: None,
            transaction_type: None,
            from: None,
            to: None,
            skip,
            limit,
        }
    }
}

// Database entity model for the transaction header
#[derive(Debug, Clone, FromRow)]
struct Transaction {
    pub id: TransactionId,
    pub employee_id: EmployeeId,
    pub payment_type: PaymentType,
    pub transaction_type: TransactionType,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl From<(Vec<TransactionItemDBResponse>, Transaction)> for TransactionDBResponse {
    fn from((items, t): (Vec<TransactionItemDBResponse>, Transaction)) -> Self {
        Self {
            id: t.id,
            employee_id: t.employee_id,
            payment_type: t.payment_type,
            transaction_type: t.transaction_type,
            total_cents: t.total_cents,
            created_at: t.created_at,
            items,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct LockedProduct {
    pub id: ProductId,
    pub name: String,
    pub price_cents: i32,
    pub inventory: i32,
}

/// A priced order line, ready to insert
#[derive(Debug, Clone, PartialEq, Eq)]
struct PricedLine {
    product_id: ProductId,
    product_name: String,
    quantity: i32,
    subtotal_cents: i64,
    /// Stock after this line is applied
    new_inventory: i32,
}

pub struct Transactions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Transactions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Record a transaction, price its lines and move stock, atomically.
    ///
    /// Repeated lines for the same product are merged. Fails with `InsufficientInventory` if a
    /// sale or discard would take a product below zero, and with a foreign key violation if a
    /// product doesn't exist.
    #[instrument(skip(self, request), fields(employee_id = request.employee_id, lines = request.items.len()), err)]
    pub async fn create(&mut self, request: &TransactionCreateDBRequest) -> Result<TransactionDBResponse> {
        let merged = request.merged_items();
        let product_ids: Vec<ProductId> = merged.keys().copied().collect();

        let mut tx = self.db.begin().await?;

        // Lock in id order so concurrent orders for overlapping products can't deadlock
        let locked = sqlx::query_as::<_, LockedProduct>(
            "SELECT id, name, price_cents, inventory FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;
        let locked: HashMap<ProductId, LockedProduct> = locked.into_iter().map(|p| (p.id, p)).collect();

        let lines = price_lines(&merged, &locked, request.transaction_type)?;
        let total_cents: i64 = lines.iter().map(|l| l.subtotal_cents).sum();

        if request.transaction_type.inventory_sign() != 0 {
            for line in &lines {
                sqlx::query("UPDATE products SET inventory = $2, updated_at = NOW() WHERE id = $1")
                    .bind(line.product_id)
                    .bind(line.new_inventory)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let header = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (employee_id, payment_type, transaction_type, total_cents)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.employee_id)
        .bind(request.payment_type)
        .bind(request.transaction_type)
        .bind(total_cents)
        .fetch_one(&mut *tx)
        .await?;

        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();
        let subtotals: Vec<i64> = lines.iter().map(|l| l.subtotal_cents).collect();

        let inserted: Vec<(i32, ProductId)> = sqlx::query_as(
            r#"
            INSERT INTO transaction_items (transaction_id, product_id, quantity, subtotal_cents)
            SELECT $1, product_id, quantity, subtotal_cents
            FROM UNNEST($2::INTEGER[], $3::INTEGER[], $4::BIGINT[]) AS t(product_id, quantity, subtotal_cents)
            RETURNING id, product_id
            "#,
        )
        .bind(header.id)
        .bind(&ids)
        .bind(&quantities)
        .bind(&subtotals)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            transaction_id = header.id,
            transaction_type = ?header.transaction_type,
            total = %format_cents(header.total_cents),
            "Transaction recorded"
        );

        let item_ids: HashMap<ProductId, i32> = inserted.into_iter().map(|(id, product_id)| (product_id, id)).collect();
        let items = lines
            .into_iter()
            .map(|line| TransactionItemDBResponse {
                id: item_ids.get(&line.product_id).copied().unwrap_or_default(),
                transaction_id: header.id,
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                subtotal_cents: line.subtotal_cents,
            })
            .collect();

        Ok(TransactionDBResponse::from((items, header)))
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: TransactionId) -> Result<Option<TransactionDBResponse>> {
        let header = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let mut items = load_items(&mut *self.db, &[id]).await?;
        Ok(Some(TransactionDBResponse::from((items.remove(&id).unwrap_or_default(), header))))
    }

    /// List transactions, newest first, with their lines
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &TransactionFilter) -> Result<Vec<TransactionDBResponse>> {
        let mut query = QueryBuilder::new("SELECT * FROM transactions WHERE 1=1");
        push_filter(&mut query, filter);

        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let headers = query.build_query_as::<Transaction>().fetch_all(&mut *self.db).await?;

        let ids: Vec<TransactionId> = headers.iter().map(|t| t.id).collect();
        let mut items = load_items(&mut *self.db, &ids).await?;

        Ok(headers
            .into_iter()
            .map(|t| {
                let lines = items.remove(&t.id).unwrap_or_default();
                TransactionDBResponse::from((lines, t))
            })
            .collect())
    }

    /// Count transactions matching the filter, ignoring pagination
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &TransactionFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM transactions WHERE 1=1");
        push_filter(&mut query, filter);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// Delete a transaction record and its lines. Stock is not touched; record a return or
    /// discard to move inventory.
    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, id: TransactionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    if let Some(employee_id) = filter.employee_id {
        query.push(" AND employee_id = ");
        query.push_bind(employee_id);
    }
    if let Some(payment_type) = filter.payment_type {
        query.push(" AND payment_type = ");
        query.push_bind(payment_type);
    }
    if let Some(transaction_type) = filter.transaction_type {
        query.push(" AND transaction_type = ");
        query.push_bind(transaction_type);
    }
    if let Some(from) = filter.from {
        query.push(" AND created_at >= ");
        query.push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND created_at < ");
        query.push_bind(to);
    }
}

/// Price each merged line from the locked product rows and work out the resulting stock.
fn price_lines(
    merged: &std::collections::BTreeMap<ProductId, i64>,
    locked: &HashMap<ProductId, LockedProduct>,
    transaction_type: TransactionType,
) -> Result<Vec<PricedLine>> {
    let sign = transaction_type.inventory_sign();

    merged
        .iter()
        .map(|(&product_id, &quantity)| {
            let product = locked.get(&product_id).ok_or_else(|| DbError::ForeignKeyViolation {
                constraint: Some("transaction_items_product_id_fkey".to_string()),
                table: Some("transaction_items".to_string()),
                message: format!("product {product_id} does not exist"),
            })?;

            let out_of_range = |what: &str| DbError::CheckViolation {
                constraint: Some("transaction_items_quantity_check".to_string()),
                table: Some("transaction_items".to_string()),
                message: format!("{what} out of range for product {product_id}"),
            };

            let line_quantity = i32::try_from(quantity).map_err(|_| out_of_range("quantity"))?;
            let new_inventory = i64::from(product.inventory) + sign * quantity;

            if new_inventory < 0 {
                return Err(DbError::InsufficientInventory {
                    product_id,
                    requested: quantity,
                    available: i64::from(product.inventory),
                });
            }

            Ok(PricedLine {
                product_id,
                product_name: product.name.clone(),
                quantity: line_quantity,
                subtotal_cents: i64::from(product.price_cents) * quantity,
                new_inventory: i32::try_from(new_inventory).map_err(|_| out_of_range("inventory"))?,
            })
        })
        .collect()
}

async fn load_items(
    conn: &mut PgConnection,
    transaction_ids: &[TransactionId],
) -> Result<HashMap<TransactionId, Vec<TransactionItemDBResponse>>> {
    if transaction_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, TransactionItemDBResponse>(
        r#"
        SELECT ti.id, ti.transaction_id, ti.product_id, p.name AS product_name, ti.quantity, ti.subtotal_cents
        FROM transaction_items ti
        JOIN products p ON p.id = ti.product_id
        WHERE ti.transaction_id = ANY($1)
        ORDER BY ti.id
        "#,
    )
    .bind(transaction_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_transaction: HashMap<TransactionId, Vec<TransactionItemDBResponse>> = HashMap::new();
    for row in rows {
        by_transaction.entry(row.transaction_id).or_default().push(row);
    }
    Ok(by_transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Employees, Products, Repository};
    use crate::db::models::{
        employees::EmployeeCreateDBRequest,
        products::{ProductCreateDBRequest, ProductType},
        transactions::TransactionItemRequest,
    };
    use sqlx::PgPool;
    use std::collections::BTreeMap;

    fn locked(id: ProductId, price_cents: i32, inventory: i32) -> (ProductId, LockedProduct) {
        (
            id,
            LockedProduct {
                id,
                name: format!("Product {id}"),
                price_cents,
                inventory,
            },
        )
    }

    #[test]
    fn test_price_lines_sale() {
        let merged = BTreeMap::from([(1, 2i64), (2, 1i64)]);
        let products = HashMap::from([locked(1, 550, 10), locked(2, 75, 1)]);

        let lines = price_lines(&merged, &products, TransactionType::Sale).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].subtotal_cents, 1100);
        assert_eq!(lines[0].new_inventory, 8);
        assert_eq!(lines[1].subtotal_cents, 75);
        assert_eq!(lines[1].new_inventory, 0);
        assert_eq!(lines.iter().map(|l| l.subtotal_cents).sum::<i64>(), 1175);
    }

    #[test]
    fn test_price_lines_return_and_void() {
        let merged = BTreeMap::from([(1, 3i64)]);
        let products = HashMap::from([locked(1, 500, 0)]);

        let returned = price_lines(&merged, &products, TransactionType::Return).unwrap();
        assert_eq!(returned[0].new_inventory, 3);

        let voided = price_lines(&merged, &products, TransactionType::Void).unwrap();
        assert_eq!(voided[0].new_inventory, 0);
        assert_eq!(voided[0].subtotal_cents, 1500);
    }

    #[test]
    fn test_price_lines_rejects_oversell_and_unknown_products() {
        let products = HashMap::from([locked(1, 500, 2)]);

        let err = price_lines(&BTreeMap::from([(1, 3i64)]), &products, TransactionType::Discard).unwrap_err();
        assert!(matches!(
            err,
            DbError::InsufficientInventory {
                product_id: 1,
                requested: 3,
                available: 2
            }
        ));

        let err = price_lines(&BTreeMap::from([(9, 1i64)]), &products, TransactionType::Sale).unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    async fn setup(pool: &PgPool) -> (EmployeeId, ProductId, ProductId) {
        let mut conn = pool.acquire().await.unwrap();
        let employee = Employees::new(&mut conn)
            .create(&EmployeeCreateDBRequest {
                name: "Cashier".to_string(),
                email: "cashier@boba.example".to_string(),
                is_admin: false,
            })
            .await
            .unwrap();

        let mut products = Products::new(&mut conn);
        let tea = products
            .create(&ProductCreateDBRequest {
                name: "Classic Milk Tea".to_string(),
                product_type: ProductType::MilkTea,
                price_cents: 500,
                inventory: 10,
                calories: 300,
                img_src: None,
                allergen_ids: vec![],
            })
            .await
            .unwrap();
        let pearls = products
            .create(&ProductCreateDBRequest {
                name: "Pearls".to_string(),
                product_type: ProductType::Topping,
                price_cents: 75,
                inventory: 5,
                calories: 100,
                img_src: None,
                allergen_ids: vec![],
            })
            .await
            .unwrap();

        (employee.id, tea.id, pearls.id)
    }

    fn order(employee_id: EmployeeId, transaction_type: TransactionType, items: &[(ProductId, i32)]) -> TransactionCreateDBRequest {
        TransactionCreateDBRequest {
            employee_id,
            payment_type: PaymentType::Card,
            transaction_type,
            items: items
                .iter()
                .map(|&(product_id, quantity)| TransactionItemRequest { product_id, quantity })
                .collect(),
        }
    }

    async fn inventory(pool: &PgPool, id: ProductId) -> i32 {
        sqlx::query_scalar("SELECT inventory FROM products WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn test_create_sale_totals_and_inventory(pool: PgPool) {
        let (employee_id, tea, pearls) = setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Transactions::new(&mut conn);

        let recorded = repo
            .create(&order(employee_id, TransactionType::Sale, &[(tea, 1), (pearls, 2), (tea, 1)]))
            .await
            .unwrap();

        assert_eq!(recorded.items.len(), 2);
        assert_eq!(recorded.total_cents, 2 * 500 + 2 * 75);
        assert_eq!(recorded.total_cents, recorded.items.iter().map(|i| i.subtotal_cents).sum::<i64>());

        drop(repo);
        assert_eq!(inventory(&pool, tea).await, 8);
        assert_eq!(inventory(&pool, pearls).await, 3);

        let mut repo = Transactions::new(&mut conn);
        let fetched = repo.get_by_id(recorded.id).await.unwrap().unwrap();
        assert_eq!(fetched.items, recorded.items);
        assert_eq!(fetched.items[0].product_name, "Classic Milk Tea");
    }

    #[sqlx::test]
    async fn test_oversell_rolls_back(pool: PgPool) {
        let (employee_id, tea, pearls) = setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Transactions::new(&mut conn);

        let err = repo
            .create(&order(employee_id, TransactionType::Sale, &[(tea, 1), (pearls, 6)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientInventory { .. }));

        assert_eq!(repo.count(&TransactionFilter::new(0, 10)).await.unwrap(), 0);
        drop(repo);
        assert_eq!(inventory(&pool, tea).await, 10);
    }

    #[sqlx::test]
    async fn test_return_void_and_filters(pool: PgPool) {
        let (employee_id, tea, _) = setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Transactions::new(&mut conn);

        repo.create(&order(employee_id, TransactionType::Return, &[(tea, 2)])).await.unwrap();
        let void = repo.create(&order(employee_id, TransactionType::Void, &[(tea, 4)])).await.unwrap();

        let mut filter = TransactionFilter::new(0, 10);
        filter.transaction_type = Some(TransactionType::Void);
        let voids = repo.list(&filter).await.unwrap();
        assert_eq!(voids.len(), 1);
        assert_eq!(voids[0].id, void.id);
        assert_eq!(repo.count(&TransactionFilter::new(0, 10)).await.unwrap(), 2);

        assert!(repo.delete(void.id).await.unwrap());
        assert!(repo.get_by_id(void.id).await.unwrap().is_none());

        drop(repo);
        // Return adds two, void leaves stock alone
        assert_eq!(inventory(&pool, tea).await, 12);
    }

    #[sqlx::test]
    async fn test_unknown_product_is_foreign_key_violation(pool: PgPool) {
        let (employee_id, _, _) = setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Transactions::new(&mut conn);

        let err = repo
            .create(&order(employee_id, TransactionType::Sale, &[(123_456, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
