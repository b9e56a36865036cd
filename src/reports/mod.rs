//! Product quality reports: domain types, store seams, and the batch
//! generation pipeline.

pub mod pipeline;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ai::{ProductAnalysis, Sentiment, SentimentCounts};

pub use pipeline::{ReportRunConfig, RetryOutcome, RunSummary};

/// Minimal product handle used by the batch loop.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRef {
    pub id: Uuid,
    pub title: String,
}

/// One rating as the analysis prompt sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingView {
    pub score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Product snapshot handed to the AI client: title, description, derived
/// rating stats, and the individual ratings.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub average_rating: f64,
    pub rating_count: i64,
    pub ratings: Vec<RatingView>,
}

impl ProductView {
    /// Histogram of score buckets ("1".."5") over the current rating set.
    pub fn rating_distribution(&self) -> BTreeMap<String, i64> {
        let mut buckets = BTreeMap::new();
        for r in &self.ratings {
            *buckets.entry(r.score.to_string()).or_insert(0) += 1;
        }
        buckets
    }
}

/// The fields written on every report upsert. The store replaces the
/// existing row in place and bumps `updated_at`; no history is kept.
#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload {
    pub overall_score: f64,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub sentiment: Sentiment,
    pub rating_distribution: BTreeMap<String, i64>,
    pub sentiment_counts: SentimentCounts,
}

impl ReportPayload {
    pub fn from_analysis(analysis: ProductAnalysis, distribution: BTreeMap<String, i64>) -> Self {
        Self {
            overall_score: analysis.score,
            summary: analysis.summary,
            strengths: analysis.strengths,
            weaknesses: analysis.weaknesses,
            suggestions: analysis.suggestions,
            sentiment: analysis.sentiment,
            rating_distribution: distribution,
            sentiment_counts: analysis.sentiment_analysis,
        }
    }

    /// Neutral zero-value report written when generation ultimately fails,
    /// so every active product has a report row after a completed run.
    pub fn fallback() -> Self {
        Self {
            overall_score: 0.0,
            summary: "Failed to generate AI analysis".to_string(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            suggestions: Vec::new(),
            sentiment: Sentiment::Neutral,
            rating_distribution: BTreeMap::new(),
            sentiment_counts: SentimentCounts::default(),
        }
    }
}

/// Persisted report row, one per product.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub overall_score: f64,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub sentiment: Sentiment,
    pub rating_distribution: BTreeMap<String, i64>,
    pub sentiment_counts: SentimentCounts,
    pub updated_at: DateTime<Utc>,
}

/// Read side of the product catalog as the report pipeline consumes it.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn active_products(&self) -> anyhow::Result<Vec<ProductRef>>;
    async fn product_view(&self, product_id: Uuid) -> anyhow::Result<Option<ProductView>>;
}

/// Single current-state table keyed by product id.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn upsert_report(
        &self,
        product_id: Uuid,
        payload: &ReportPayload,
    ) -> anyhow::Result<ReportRecord>;
    async fn find_report(&self, product_id: Uuid) -> anyhow::Result<Option<ReportRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Sentiment;

    #[test]
    fn distribution_buckets_by_score() {
        let view = ProductView {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: "d".into(),
            average_rating: 4.0,
            rating_count: 4,
            ratings: vec![
                RatingView { score: 5, comment: None },
                RatingView { score: 5, comment: None },
                RatingView { score: 3, comment: None },
                RatingView { score: 1, comment: None },
            ],
        };
        let dist = view.rating_distribution();
        assert_eq!(dist.get("5"), Some(&2));
        assert_eq!(dist.get("3"), Some(&1));
        assert_eq!(dist.get("1"), Some(&1));
        assert_eq!(dist.get("2"), None);
    }

    #[test]
    fn fallback_payload_is_neutral_and_empty() {
        let fb = ReportPayload::fallback();
        assert_eq!(fb.overall_score, 0.0);
        assert_eq!(fb.sentiment, Sentiment::Neutral);
        assert!(fb.strengths.is_empty());
        assert!(fb.weaknesses.is_empty());
        assert!(fb.suggestions.is_empty());
        assert_eq!(fb.sentiment_counts, SentimentCounts::default());
    }
}
