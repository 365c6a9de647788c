//! Product catalog capability
//!
//! The scoring engine never issues its own catalog queries; it consumes the
//! read-only [`CatalogStore`] capability. The catalog itself (products,
//! categories, ratings) is owned by the storefront application — this module
//! ships a Postgres-backed implementation over the shared `products` table and
//! leaves the trait open for in-memory test doubles.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Active catalog product as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_ids: Vec<i64>,
    pub rating: f64,
}

impl Product {
    /// True if any of the keyword substrings appears in the product's name,
    /// description, or tags (case-insensitive).
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let kw = keyword.to_lowercase();
        self.name.to_lowercase().contains(&kw)
            || self.description.to_lowercase().contains(&kw)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&kw))
    }
}

/// Read-only catalog access consumed by the scoring pipeline.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch the active products among `ids`. Inactive ids are silently
    /// dropped from the result.
    async fn find_active_products_by_id(&self, ids: &[i64]) -> Result<Vec<Product>>;

    /// Fetch one active product, or `None` if absent or inactive.
    async fn find_active_product(&self, id: i64) -> Result<Option<Product>>;

    /// Top active products by rating descending (popularity fallback).
    async fn find_active_products(&self, limit: usize) -> Result<Vec<Product>>;

    /// Active products whose name, description, or tags substring-match any
    /// of the keywords, excluding `exclude_ids`.
    async fn search_active_products_by_keywords(
        &self,
        keywords: &[String],
        exclude_ids: &[i64],
    ) -> Result<Vec<Product>>;

    /// Active products in any of the given categories, excluding
    /// `exclude_ids`, ordered by rating descending.
    async fn find_active_products_by_category(
        &self,
        category_ids: &[i64],
        exclude_ids: &[i64],
        limit: usize,
    ) -> Result<Vec<Product>>;
}

/// Postgres-backed catalog over the storefront's `products` table.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    tags: Option<Vec<String>>,
    category_ids: Option<Vec<i64>>,
    rating: Option<f64>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description.unwrap_or_default(),
            tags: row.tags.unwrap_or_default(),
            category_ids: row.category_ids.unwrap_or_default(),
            rating: row.rating.unwrap_or(0.0),
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, tags, category_ids, rating::double precision as rating";

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn find_active_products_by_id(&self, ids: &[i64]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active = true AND id = ANY($1)
            "#,
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_active_product(&self, id: i64) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active = true AND id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_active_products(&self, limit: usize) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active = true
            ORDER BY rating DESC, id ASC
            LIMIT $1
            "#,
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn search_active_products_by_keywords(
        &self,
        keywords: &[String],
        exclude_ids: &[i64],
    ) -> Result<Vec<Product>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products p
            WHERE p.is_active = true
              AND NOT (p.id = ANY($2))
              AND EXISTS (
                  SELECT 1 FROM unnest($1::text[]) kw
                  WHERE p.name ILIKE '%' || kw || '%'
                     OR p.description ILIKE '%' || kw || '%'
                     OR EXISTS (
                         SELECT 1 FROM unnest(p.tags) t
                         WHERE t ILIKE '%' || kw || '%'
                     )
              )
            ORDER BY p.rating DESC, p.id ASC
            "#,
        ))
        .bind(keywords)
        .bind(exclude_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_active_products_by_category(
        &self,
        category_ids: &[i64],
        exclude_ids: &[i64],
        limit: usize,
    ) -> Result<Vec<Product>> {
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active = true
              AND category_ids && $1::bigint[]
              AND NOT (id = ANY($2))
            ORDER BY rating DESC, id ASC
            LIMIT $3
            "#,
        ))
        .bind(category_ids)
        .bind(exclude_ids)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
