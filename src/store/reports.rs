//! Report persistence: a single current-state row per product, replaced in
//! place on every regeneration.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::ai::{Sentiment, SentimentCounts};
use crate::reports::{ReportPayload, ReportRecord, ReportStore};
use crate::store::Db;

const REPORT_COLS: &str = "id, product_id, overall_score, summary, strengths, weaknesses, \
                           suggestions, sentiment, rating_distribution, sentiment_counts, updated_at";

fn map_report(row: &sqlx::postgres::PgRow) -> anyhow::Result<ReportRecord> {
    let sentiment: String = row.try_get("sentiment")?;
    let distribution: Value = row.try_get("rating_distribution")?;
    let counts: Value = row.try_get("sentiment_counts")?;
    Ok(ReportRecord {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        overall_score: row.try_get("overall_score")?,
        summary: row.try_get("summary")?,
        strengths: row.try_get("strengths")?,
        weaknesses: row.try_get("weaknesses")?,
        suggestions: row.try_get("suggestions")?,
        sentiment: Sentiment::parse(&sentiment),
        rating_distribution: serde_json::from_value(distribution)?,
        sentiment_counts: serde_json::from_value::<SentimentCounts>(counts).unwrap_or_default(),
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ReportStore for Db {
    async fn upsert_report(
        &self,
        product_id: Uuid,
        payload: &ReportPayload,
    ) -> anyhow::Result<ReportRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO reports
                (id, product_id, overall_score, summary, strengths, weaknesses,
                 suggestions, sentiment, rating_distribution, sentiment_counts, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
             ON CONFLICT (product_id) DO UPDATE SET
                overall_score = EXCLUDED.overall_score,
                summary = EXCLUDED.summary,
                strengths = EXCLUDED.strengths,
                weaknesses = EXCLUDED.weaknesses,
                suggestions = EXCLUDED.suggestions,
                sentiment = EXCLUDED.sentiment,
                rating_distribution = EXCLUDED.rating_distribution,
                sentiment_counts = EXCLUDED.sentiment_counts,
                updated_at = now()
             RETURNING {REPORT_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(payload.overall_score)
        .bind(&payload.summary)
        .bind(&payload.strengths)
        .bind(&payload.weaknesses)
        .bind(&payload.suggestions)
        .bind(payload.sentiment.as_str())
        .bind(serde_json::to_value(&payload.rating_distribution)?)
        .bind(serde_json::to_value(payload.sentiment_counts)?)
        .fetch_one(&self.pool)
        .await?;
        map_report(&row)
    }

    async fn find_report(&self, product_id: Uuid) -> anyhow::Result<Option<ReportRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {REPORT_COLS} FROM reports WHERE product_id = $1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_report).transpose()
    }
}
