//! Backfill of product embeddings used to rank chat recommendations.

use super::provider::LanguageModel;
use crate::{
    db::{handlers::Products, models::products::ProductEmbedding},
    errors::Error,
};
use sqlx::PgPool;
use tracing::{info, instrument};

/// The text a product is embedded from, and the line describing it to the model
pub fn product_summary(product: &ProductEmbedding) -> String {
    let allergens = if product.allergens.is_empty() {
        "None".to_string()
    } else {
        product.allergens.join(", ")
    };

    format!(
        "{}. Type: {}. {} kcal. Allergens: {}",
        product.name, product.product_type, product.calories, allergens
    )
}

/// Embed every product (or only those without an embedding) and store the vectors.
/// Returns the number of products embedded.
#[instrument(skip(db, model), err)]
pub async fn embed_products(db: &PgPool, model: &dyn LanguageModel, missing_only: bool) -> Result<usize, Error> {
    let products = {
        let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Products::new(&mut conn).list_for_embedding(missing_only).await?
    };

    let mut embedded = 0;
    for product in &products {
        let embedding = model.embed(&product_summary(product)).await?;

        let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Products::new(&mut conn).set_embedding(product.id, &embedding).await?;
        embedded += 1;
    }

    info!(embedded, total = products.len(), "Product embeddings updated");
    Ok(embedded)
}
