//! Gemini-backed implementation of [`AnalysisProvider`].
//!
//! REST surface: `POST {base}/v1beta/models/{model}:generateContent`.
//! The reply text is expected to contain a JSON object, possibly wrapped in a
//! Markdown code fence.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::ai::{parse_analysis, AnalysisError, AnalysisProvider, ProductAnalysis};
use crate::config::GeminiConfig;
use crate::reports::ProductView;

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push('…');
    }
    s
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Build a client from config. Errors when no API key is configured;
    /// callers that can tolerate that (the API server) should check
    /// `cfg.api_key` first and skip report generation.
    pub fn new(cfg: &GeminiConfig) -> Result<Self, AnalysisError> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| AnalysisError::Other("GEMINI_API_KEY is not configured".into()))?;
        let http = Client::builder()
            .user_agent("crafted-market/0.1")
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_prompt(product: &ProductView) -> String {
        let ratings_json = serde_json::to_string(&product.ratings)
            .unwrap_or_else(|_| "[]".to_string());
        let average = if product.rating_count > 0 {
            format!("{:.1}", product.average_rating)
        } else {
            "N/A".to_string()
        };
        format!(
            "Analyze the following product and provide a detailed report:\n\
             Title: {title}\n\
             Description: {description}\n\
             Average Rating: {average}\n\
             Ratings: {ratings}\n\
             \n\
             Return a valid JSON object with the following fields:\n\
             - score: A numerical score out of 100 based on quality, appeal, and ratings\n\
             - summary: A brief summary of the product's strengths and weaknesses\n\
             - strengths: An array of positive aspects\n\
             - weaknesses: An array of areas for improvement\n\
             - suggestions: An array of suggestions for improvement\n\
             - sentiment: Overall sentiment (\"positive\", \"neutral\", \"negative\")\n\
             - sentimentAnalysis: Object with counts of positive, neutral, and negative sentiments\n\
             \n\
             Ensure the response is raw JSON without Markdown code fences or other formatting.",
            title = product.title,
            description = product.description,
            average = average,
            ratings = ratings_json,
        )
    }

    fn extract_text(body: &Value) -> Result<&str, AnalysisError> {
        body.get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| AnalysisError::Other("model response carried no text part".into()))
    }
}

#[async_trait]
impl AnalysisProvider for GeminiClient {
    async fn analyze(&self, product: &ProductView) -> Result<ProductAnalysis, AnalysisError> {
        let prompt = Self::build_prompt(product);
        debug!(
            product_id = %product.id,
            prompt_len = prompt.len(),
            "sending analysis prompt"
        );

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await?;

        let status = resp.status();
        let body_text = resp.text().await?;
        if !status.is_success() {
            warn!(
                product_id = %product.id,
                status = %status.as_u16(),
                body = %truncate_for_log(body_text.clone(), 200),
                "analysis request failed"
            );
            return Err(AnalysisError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body: Value = serde_json::from_str(&body_text)?;
        let raw_text = Self::extract_text(&body)?;
        debug!(
            product_id = %product.id,
            raw = %truncate_for_log(raw_text.to_string(), 500),
            "model reply received"
        );
        parse_analysis(raw_text)
    }
}
