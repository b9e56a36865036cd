//! Rating writes and the derived-stat refresh that keeps
//! `products.average_rating` / `products.rating_count` in sync.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Db;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewRating {
    pub user_id: Uuid,
    pub score: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Mean of the given scores rounded to one decimal place. An empty set
/// yields `(0.0, 0)` rather than NaN.
pub fn aggregate(scores: &[i32]) -> (f64, i64) {
    if scores.is_empty() {
        return (0.0, 0);
    }
    let sum: i64 = scores.iter().map(|&s| s as i64).sum();
    let mean = sum as f64 / scores.len() as f64;
    (round1(mean), scores.len() as i64)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn validate_score(score: i32) -> Result<(), AppError> {
    if !(1..=5).contains(&score) {
        return Err(AppError::validation("Rating must be between 1 and 5"));
    }
    Ok(())
}

fn map_rating(row: &sqlx::postgres::PgRow) -> Result<RatingRecord, sqlx::Error> {
    Ok(RatingRecord {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        user_id: row.try_get("user_id")?,
        score: row.try_get("score")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Result of one rating write, with the product's refreshed derived stats.
#[derive(Debug, Clone, Serialize)]
pub struct RatingWithStats {
    pub rating: RatingRecord,
    pub average_rating: f64,
    pub rating_count: i64,
}

/// Per-entry outcome of a bulk rating insert. Invalid and duplicate
/// entries are recorded, not fatal.
#[derive(Debug, Clone, Serialize)]
pub struct BulkRatingOutcome {
    pub inserted: u64,
    pub skipped: u64,
    pub errors: Vec<BulkRatingError>,
    pub average_rating: f64,
    pub rating_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkRatingError {
    pub index: usize,
    pub reason: String,
}

impl Db {
    /// Insert one rating. One rating per (product, user); a second attempt
    /// is a validation error. Refreshes the product's derived stats.
    pub async fn add_rating(
        &self,
        product_id: Uuid,
        rating: &NewRating,
    ) -> Result<RatingWithStats, AppError> {
        validate_score(rating.score)?;
        self.require_active_product(product_id).await?;

        let row = sqlx::query(
            "INSERT INTO ratings (id, product_id, user_id, score, comment)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (product_id, user_id) DO NOTHING
             RETURNING id, product_id, user_id, score, comment, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(rating.user_id)
        .bind(rating.score)
        .bind(rating.comment.as_deref())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::validation("You have already rated this product"))?;

        let record = map_rating(&row)?;
        let (average_rating, rating_count) = self.refresh_product_stats(product_id).await?;
        Ok(RatingWithStats {
            rating: record,
            average_rating,
            rating_count,
        })
    }

    /// Insert many ratings for one product. Invalid scores and duplicates
    /// are collected per entry instead of failing the batch. The inserts
    /// run in one transaction, so a storage error mid-batch rolls back
    /// rather than leaving a partial batch with stale derived stats. Stats
    /// are refreshed once after commit.
    pub async fn add_ratings_bulk(
        &self,
        product_id: Uuid,
        ratings: &[NewRating],
    ) -> Result<BulkRatingOutcome, AppError> {
        if ratings.is_empty() {
            return Err(AppError::validation("ratings list must not be empty"));
        }
        self.require_active_product(product_id).await?;

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        let mut skipped = 0u64;
        let mut errors = Vec::new();
        for (index, r) in ratings.iter().enumerate() {
            if let Err(e) = validate_score(r.score) {
                errors.push(BulkRatingError {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
            let result = sqlx::query(
                "INSERT INTO ratings (id, product_id, user_id, score, comment)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (product_id, user_id) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(r.user_id)
            .bind(r.score)
            .bind(r.comment.as_deref())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                skipped += 1;
            } else {
                inserted += 1;
            }
        }
        tx.commit().await?;
        if skipped > 0 || !errors.is_empty() {
            info!(
                product_id = %product_id,
                skipped,
                invalid = errors.len(),
                "bulk insert skipped entries"
            );
        }
        let (average_rating, rating_count) = self.refresh_product_stats(product_id).await?;
        Ok(BulkRatingOutcome {
            inserted,
            skipped,
            errors,
            average_rating,
            rating_count,
        })
    }

    pub async fn ratings_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<RatingRecord>, AppError> {
        self.require_product(product_id).await?;
        let rows = sqlx::query(
            "SELECT id, product_id, user_id, score, comment, created_at
             FROM ratings WHERE product_id = $1 ORDER BY created_at DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(map_rating)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Recompute the product's derived rating columns from the full rating
    /// set and return them. Idempotent; running it twice changes nothing.
    pub async fn refresh_product_stats(&self, product_id: Uuid) -> Result<(f64, i64), AppError> {
        let scores: Vec<i32> =
            sqlx::query_scalar("SELECT score FROM ratings WHERE product_id = $1")
                .bind(product_id)
                .fetch_all(&self.pool)
                .await?;
        let (average, count) = aggregate(&scores);

        sqlx::query(
            "UPDATE products SET average_rating = $2, rating_count = $3, updated_at = now()
             WHERE id = $1",
        )
        .bind(product_id)
        .bind(average)
        .bind(count)
        .execute(&self.pool)
        .await?;
        Ok((average, count))
    }

    async fn require_product(&self, product_id: Uuid) -> Result<(), AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(AppError::not_found(format!("product {product_id}")));
        }
        Ok(())
    }

    async fn require_active_product(&self, product_id: Uuid) -> Result<(), AppError> {
        let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        match active {
            None => Err(AppError::not_found(format!("product {product_id}"))),
            Some(false) => Err(AppError::validation("product is not active")),
            Some(true) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_score_set_aggregates_to_zero() {
        assert_eq!(aggregate(&[]), (0.0, 0));
    }

    #[test]
    fn mean_rounds_to_one_decimal() {
        // 4 + 5 + 5 = 14 / 3 = 4.666... -> 4.7
        assert_eq!(aggregate(&[4, 5, 5]), (4.7, 3));
        // 1 + 2 = 1.5 stays exact
        assert_eq!(aggregate(&[1, 2]), (1.5, 2));
        assert_eq!(aggregate(&[3]), (3.0, 1));
    }

    #[test]
    fn aggregation_is_a_pure_function_of_the_score_set() {
        let scores = [2, 3, 5, 5, 4];
        assert_eq!(aggregate(&scores), aggregate(&scores));
    }

    #[test]
    fn score_bounds_are_enforced() {
        assert!(validate_score(0).is_err());
        assert!(validate_score(6).is_err());
        assert!(validate_score(1).is_ok());
        assert!(validate_score(5).is_ok());
    }
}
