//! AI analysis boundary: one round trip per invocation, no internal retries.
//! Retry budgeting belongs to the report orchestrator.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reports::ProductView;

pub use gemini::GeminiClient;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network: {0}")]
    Net(#[from] reqwest::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("other: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Lenient parse for values coming back from storage; unknown text
    /// falls back to neutral.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentimentCounts {
    #[serde(default)]
    pub positive: i64,
    #[serde(default)]
    pub neutral: i64,
    #[serde(default)]
    pub negative: i64,
}

/// Normalized analysis payload returned by the model.
///
/// Every field carries a zero-value default so a sparse-but-valid JSON
/// object still normalizes; a payload that is not a JSON object at all is
/// an `AnalysisError`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAnalysis {
    #[serde(default)]
    pub score: f64,
    #[serde(default = "default_summary")]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default, rename = "sentimentAnalysis")]
    pub sentiment_analysis: SentimentCounts,
}

fn default_summary() -> String {
    "No summary available".to_string()
}

impl ProductAnalysis {
    /// Clamp the model-reported score into the documented 0..=100 range.
    pub fn normalized(mut self) -> Self {
        if !self.score.is_finite() {
            self.score = 0.0;
        }
        self.score = self.score.clamp(0.0, 100.0);
        self
    }
}

/// Seam between the orchestrator and the generative model.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, product: &ProductView) -> Result<ProductAnalysis, AnalysisError>;
}

/// Strip an optional leading/trailing Markdown code fence from a model reply.
/// Models frequently wrap JSON in ```json ... ``` despite being told not to.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence line itself (e.g. "```json").
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse model text into a normalized analysis. Fence-wrapped JSON is
/// accepted; anything that fails to parse as a JSON object is an error.
pub fn parse_analysis(raw: &str) -> Result<ProductAnalysis, AnalysisError> {
    let cleaned = strip_code_fences(raw);
    let analysis: ProductAnalysis = serde_json::from_str(cleaned)?;
    Ok(analysis.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"score\": 80}\n```";
        assert_eq!(strip_code_fences(raw), "{\"score\": 80}");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "```\n{\"score\": 80}\n```";
        assert_eq!(strip_code_fences(raw), "{\"score\": 80}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn parses_full_payload() {
        let raw = r#"{
            "score": 87,
            "summary": "Well-made leather bag",
            "strengths": ["durable", "stylish"],
            "weaknesses": ["pricey"],
            "suggestions": ["offer more colors"],
            "sentiment": "positive",
            "sentimentAnalysis": {"positive": 5, "neutral": 1, "negative": 0}
        }"#;
        let a = parse_analysis(raw).unwrap();
        assert_eq!(a.score, 87.0);
        assert_eq!(a.sentiment, Sentiment::Positive);
        assert_eq!(a.strengths.len(), 2);
        assert_eq!(a.sentiment_analysis.positive, 5);
    }

    #[test]
    fn defaults_missing_optional_fields() {
        let a = parse_analysis("{\"summary\": \"ok\"}").unwrap();
        assert_eq!(a.score, 0.0);
        assert_eq!(a.sentiment, Sentiment::Neutral);
        assert!(a.strengths.is_empty());
        assert!(a.weaknesses.is_empty());
        assert!(a.suggestions.is_empty());
        assert_eq!(a.sentiment_analysis, SentimentCounts::default());
    }

    #[test]
    fn rejects_non_json_payload() {
        assert!(parse_analysis("the model had a bad day").is_err());
        assert!(parse_analysis("```json\nnot json either\n```").is_err());
    }

    #[test]
    fn clamps_out_of_range_scores() {
        let a = parse_analysis("{\"score\": 250}").unwrap();
        assert_eq!(a.score, 100.0);
        let b = parse_analysis("{\"score\": -10}").unwrap();
        assert_eq!(b.score, 0.0);
    }
}
