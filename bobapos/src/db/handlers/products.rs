//! Database repository for menu products and their allergen assignments.

use std::collections::{BTreeMap, HashMap};

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        allergens::AllergenDBResponse,
        products::{InventoryChange, ProductCreateDBRequest, ProductDBResponse, ProductEmbedding, ProductType, ProductUpdateDBRequest},
    },
};
use crate::types::{AllergenId, ProductId};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, QueryBuilder};
use tracing::instrument;

/// Filter for listing products
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub product_type: Option<ProductType>,
    /// Only products with at least one unit in stock
    pub in_stock: Option<bool>,
}

const PRODUCT_COLUMNS: &str = "id, name, product_type, price_cents, inventory, calories, img_src, \
                               embedding IS NOT NULL AS has_embedding, created_at, updated_at";

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Product {
    pub id: ProductId,
    pub name: String,
    pub product_type: ProductType,
    pub price_cents: i32,
    pub inventory: i32,
    pub calories: i32,
    pub img_src: Option<String>,
    pub has_embedding: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct ProductAllergenRow {
    pub product_id: ProductId,
    pub id: AllergenId,
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
struct ProductEmbeddingRow {
    pub id: ProductId,
    pub name: String,
    pub product_type: ProductType,
    pub price_cents: i32,
    pub calories: i32,
    pub inventory: i32,
    pub allergens: Vec<String>,
    pub embedding: Option<Vec<f32>>,
}

impl From<ProductEmbeddingRow> for ProductEmbedding {
    fn from(row: ProductEmbeddingRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            product_type: row.product_type,
            price_cents: row.price_cents,
            calories: row.calories,
            inventory: row.inventory,
            allergens: row.allergens,
            embedding: row.embedding,
        }
    }
}

impl From<(Vec<AllergenDBResponse>, Product)> for ProductDBResponse {
    fn from((allergens, p): (Vec<AllergenDBResponse>, Product)) -> Self {
        Self {
            id: p.id,
            name: p.name,
            product_type: p.product_type,
            price_cents: p.price_cents,
            inventory: p.inventory,
            calories: p.calories,
            img_src: p.img_src,
            allergens,
            has_embedding: p.has_embedding,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

pub struct Products<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Products<'c> {
    type CreateRequest = ProductCreateDBRequest;
    type UpdateRequest = ProductUpdateDBRequest;
    type Response = ProductDBResponse;
    type Id = ProductId;
    type Filter = ProductFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (name, product_type, price_cents, inventory, calories, img_src)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&request.name)
        .bind(request.product_type)
        .bind(request.price_cents)
        .bind(request.inventory)
        .bind(request.calories)
        .bind(&request.img_src)
        .fetch_one(&mut *tx)
        .await?;

        replace_allergens(&mut tx, product.id, &request.allergen_ids).await?;
        let mut allergens = load_allergens(&mut tx, &[product.id]).await?;

        tx.commit().await?;

        Ok(ProductDBResponse::from((allergens.remove(&product.id).unwrap_or_default(), product)))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let product = sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        let Some(product) = product else {
            return Ok(None);
        };

        let mut allergens = load_allergens(&mut *self.db, &[id]).await?;
        Ok(Some(ProductDBResponse::from((allergens.remove(&id).unwrap_or_default(), product))))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let products = sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        let mut allergens = load_allergens(&mut *self.db, &ids).await?;

        Ok(products
            .into_iter()
            .map(|p| (p.id, ProductDBResponse::from((allergens.remove(&p.id).unwrap_or_default(), p))))
            .collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1"));

        if let Some(product_type) = filter.product_type {
            query.push(" AND product_type = ");
            query.push_bind(product_type);
        }

        match filter.in_stock {
            Some(true) => {
                query.push(" AND inventory > 0");
            }
            Some(false) => {
                query.push(" AND inventory = 0");
            }
            None => {}
        }

        query.push(" ORDER BY product_type ASC, name ASC");

        let products = query.build_query_as::<Product>().fetch_all(&mut *self.db).await?;

        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        let mut allergens = load_allergens(&mut *self.db, &ids).await?;

        Ok(products
            .into_iter()
            .map(|p| {
                let product_allergens = allergens.remove(&p.id).unwrap_or_default();
                ProductDBResponse::from((product_allergens, p))
            })
            .collect())
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        // product_allergens rows cascade; transaction_items reference blocks the delete
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        // A stale embedding would describe the old product, so drop it when the summary changes
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                product_type = COALESCE($3, product_type),
                price_cents = COALESCE($4, price_cents),
                inventory = COALESCE($5, inventory),
                calories = COALESCE($6, calories),
                img_src = CASE WHEN $7 THEN $8 ELSE img_src END,
                embedding = CASE WHEN $9 THEN NULL ELSE embedding END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(request.product_type)
        .bind(request.price_cents)
        .bind(request.inventory)
        .bind(request.calories)
        .bind(request.img_src.is_some())
        .bind(request.img_src.as_ref().and_then(|img| img.as_deref()))
        .bind(request.changes_summary())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(ref allergen_ids) = request.allergen_ids {
            replace_allergens(&mut tx, id, allergen_ids).await?;
        }

        let mut allergens = load_allergens(&mut tx, &[id]).await?;
        tx.commit().await?;

        Ok(ProductDBResponse::from((allergens.remove(&id).unwrap_or_default(), product)))
    }
}

impl<'c> Products<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// All products grouped by menu category, each group sorted by name
    #[instrument(skip(self), err)]
    pub async fn list_by_category(&mut self) -> Result<BTreeMap<ProductType, Vec<ProductDBResponse>>> {
        let products = self.list(&ProductFilter::default()).await?;

        let mut grouped: BTreeMap<ProductType, Vec<ProductDBResponse>> = BTreeMap::new();
        for product in products {
            grouped.entry(product.product_type).or_default().push(product);
        }
        Ok(grouped)
    }

    /// Apply a stock change, refusing to take inventory below zero
    #[instrument(skip(self), err)]
    pub async fn update_inventory(&mut self, id: ProductId, change: InventoryChange) -> Result<ProductDBResponse> {
        let mut tx = self.db.begin().await?;

        let current: i32 = sqlx::query_scalar("SELECT inventory FROM products WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        let new_inventory = resolve_inventory(id, current, change)?;

        sqlx::query("UPDATE products SET inventory = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(new_inventory)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(product_id = id, from = current, to = new_inventory, "Inventory updated");

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    /// Set a new price; the table's check constraint rejects negative cents
    #[instrument(skip(self), err)]
    pub async fn update_price(&mut self, id: ProductId, price_cents: i32) -> Result<ProductDBResponse> {
        let update = ProductUpdateDBRequest {
            price_cents: Some(price_cents),
            ..Default::default()
        };
        self.update(id, &update).await
    }

    /// Products that already have an embedding, for ranking chat candidates
    #[instrument(skip(self), err)]
    pub async fn list_with_embeddings(&mut self) -> Result<Vec<ProductEmbedding>> {
        self.embedding_rows(true, false).await
    }

    /// Products to (re)embed. With `missing_only`, products that already have an embedding are skipped.
    #[instrument(skip(self), err)]
    pub async fn list_for_embedding(&mut self, missing_only: bool) -> Result<Vec<ProductEmbedding>> {
        self.embedding_rows(false, missing_only).await
    }

    async fn embedding_rows(&mut self, with_embedding: bool, without_embedding: bool) -> Result<Vec<ProductEmbedding>> {
        let mut query = QueryBuilder::new(
            r#"
            SELECT p.id, p.name, p.product_type, p.price_cents, p.calories, p.inventory, p.embedding,
                   COALESCE(ARRAY_AGG(a.name ORDER BY a.name) FILTER (WHERE a.id IS NOT NULL), '{}') AS allergens
            FROM products p
            LEFT JOIN product_allergens pa ON pa.product_id = p.id
            LEFT JOIN allergens a ON a.id = pa.allergen_id
            WHERE 1=1
            "#,
        );

        if with_embedding {
            query.push(" AND p.embedding IS NOT NULL");
        }
        if without_embedding {
            query.push(" AND p.embedding IS NULL");
        }

        query.push(" GROUP BY p.id ORDER BY p.id");

        let rows = query.build_query_as::<ProductEmbeddingRow>().fetch_all(&mut *self.db).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, embedding), fields(dims = embedding.len()), err)]
    pub async fn set_embedding(&mut self, id: ProductId, embedding: &[f32]) -> Result<()> {
        let result = sqlx::query("UPDATE products SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(embedding)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

/// Compute the stock level after `change`, or the error explaining why it can't be applied
fn resolve_inventory(product_id: ProductId, current: i32, change: InventoryChange) -> Result<i32> {
    let target = match change {
        InventoryChange::Set(n) => i64::from(n),
        InventoryChange::Adjust(delta) => i64::from(current) + i64::from(delta),
    };

    if target < 0 {
        return Err(DbError::InsufficientInventory {
            product_id,
            requested: i64::from(current) - target,
            available: i64::from(current),
        });
    }

    i32::try_from(target).map_err(|_| DbError::CheckViolation {
        constraint: Some("products_inventory_check".to_string()),
        table: Some("products".to_string()),
        message: format!("inventory {target} is out of range"),
    })
}

/// Replace a product's allergen set with `allergen_ids`
async fn replace_allergens(conn: &mut PgConnection, product_id: ProductId, allergen_ids: &[AllergenId]) -> Result<()> {
    sqlx::query("DELETE FROM product_allergens WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    if !allergen_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO product_allergens (product_id, allergen_id)
            SELECT $1, allergen_id FROM UNNEST($2::INTEGER[]) AS allergen_id
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(product_id)
        .bind(allergen_ids)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Allergens for each of `product_ids`, sorted by name
async fn load_allergens(conn: &mut PgConnection, product_ids: &[ProductId]) -> Result<HashMap<ProductId, Vec<AllergenDBResponse>>> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, ProductAllergenRow>(
        r#"
        SELECT pa.product_id, a.id, a.name
        FROM product_allergens pa
        JOIN allergens a ON a.id = pa.allergen_id
        WHERE pa.product_id = ANY($1)
        ORDER BY a.name
        "#,
    )
    .bind(product_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_product: HashMap<ProductId, Vec<AllergenDBResponse>> = HashMap::new();
    for row in rows {
        by_product.entry(row.product_id).or_default().push(AllergenDBResponse {
            id: row.id,
            name: row.name,
        });
    }
    Ok(by_product)
}
