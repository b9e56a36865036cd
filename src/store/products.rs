//! Product reads and the catalog seam consumed by the report pipeline.
//!
//! `average_rating` and `rating_count` are derived columns owned by the
//! rating writer; nothing here accepts them from callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use crate::error::AppError;
use crate::reports::{ProductCatalog, ProductRef, ProductView, RatingView};
use crate::store::Db;

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub contact_info: Option<String>,
    pub average_rating: f64,
    pub rating_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-editable product fields. Derived rating columns are deliberately
/// absent; requests that try to set them are rejected upstream.
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub contact_info: Option<String>,
    pub is_active: Option<bool>,
}

fn map_product(row: &sqlx::postgres::PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: row.try_get("id")?,
        seller_id: row.try_get("seller_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        price: row.try_get("price")?,
        contact_info: row.try_get("contact_info")?,
        average_rating: row.try_get("average_rating")?,
        rating_count: row.try_get("rating_count")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const PRODUCT_COLS: &str = "id, seller_id, title, description, category, price, contact_info, \
                            average_rating, rating_count, is_active, created_at, updated_at";

impl Db {
    pub async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLS} FROM products WHERE id = $1"))
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_product).transpose().map_err(Into::into)
    }

    pub async fn update_product(
        &self,
        product_id: Uuid,
        update: &ProductUpdate,
    ) -> Result<Product, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE products SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                price = COALESCE($5, price),
                contact_info = COALESCE($6, contact_info),
                is_active = COALESCE($7, is_active),
                updated_at = now()
             WHERE id = $1
             RETURNING {PRODUCT_COLS}"
        ))
        .bind(product_id)
        .bind(update.title.as_deref())
        .bind(update.description.as_deref())
        .bind(update.category.as_deref())
        .bind(update.price)
        .bind(update.contact_info.as_deref())
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("product {product_id}")))?;
        map_product(&row).map_err(Into::into)
    }
}

#[async_trait]
impl ProductCatalog for Db {
    async fn active_products(&self) -> anyhow::Result<Vec<ProductRef>> {
        let rows = sqlx::query("SELECT id, title FROM products WHERE is_active ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(ProductRef {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                })
            })
            .collect()
    }

    async fn product_view(&self, product_id: Uuid) -> anyhow::Result<Option<ProductView>> {
        let Some(product) = sqlx::query(
            "SELECT id, title, description, average_rating, rating_count
             FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let rating_rows = sqlx::query(
            "SELECT score, comment FROM ratings WHERE product_id = $1 ORDER BY created_at",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        let ratings = rating_rows
            .iter()
            .map(|row| {
                Ok(RatingView {
                    score: row.try_get("score")?,
                    comment: row.try_get("comment")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(Some(ProductView {
            id: product.try_get("id")?,
            title: product.try_get("title")?,
            description: product.try_get("description")?,
            average_rating: product.try_get("average_rating")?,
            rating_count: product.try_get("rating_count")?,
            ratings,
        }))
    }
}
