//! Batch report generation pipeline.
//!
//! One logical worker walks all active products strictly sequentially: a
//! fresh report is skipped, a stale one is regenerated with a bounded retry
//! budget, and exhausted retries leave a neutral fallback report behind so
//! every active product has a report row after a completed run. A failure on
//! one product never aborts the run.

use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ai::{AnalysisError, AnalysisProvider};
use crate::error::AppError;
use crate::reports::{ProductCatalog, ProductRef, ReportPayload, ReportRecord, ReportStore};

/// Pacing and budget knobs for a batch run. Defaults match the production
/// schedule; tests inject zero delays.
#[derive(Debug, Clone)]
pub struct ReportRunConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub inter_product_delay: Duration,
    pub staleness: chrono::Duration,
}

impl Default for ReportRunConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            inter_product_delay: Duration::from_secs(2),
            staleness: chrono::Duration::hours(24),
        }
    }
}

/// Outcome of one full orchestrator pass. Not persisted; logged and
/// returned to the caller.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub successes: Vec<ProductRef>,
    pub failures: Vec<ReportFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportFailure {
    pub id: Uuid,
    pub title: String,
    pub reason: String,
}

/// Per-id outcome of the operator-triggered retry endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RetryOutcome {
    pub product_id: Uuid,
    #[serde(flatten)]
    pub result: RetryResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RetryResult {
    Success { message: String },
    Failed { reason: String },
}

/// Internal error split: analysis failures are retryable, everything else
/// bubbles to the per-product boundary.
#[derive(Debug, thiserror::Error)]
enum GenerateError {
    #[error("product {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

enum ProductStatus {
    Fresh,
    Generated,
    FellBack,
}

/// Generate and persist a report for one product: fetch the product view,
/// run one analysis round trip, upsert the result. No freshness check and
/// no retries here.
async fn generate_once<C, R, A>(
    catalog: &C,
    reports: &R,
    ai: &A,
    product_id: Uuid,
) -> Result<ReportRecord, GenerateError>
where
    C: ProductCatalog,
    R: ReportStore,
    A: AnalysisProvider,
{
    let view = catalog
        .product_view(product_id)
        .await?
        .ok_or(GenerateError::NotFound(product_id))?;

    let analysis = ai.analyze(&view).await?;
    let payload = ReportPayload::from_analysis(analysis, view.rating_distribution());
    let record = reports.upsert_report(product_id, &payload).await?;
    info!(
        product_id = %product_id,
        overall_score = record.overall_score,
        "report upserted"
    );
    Ok(record)
}

/// Attempt generation up to `max_retries` times, pausing `retry_delay`
/// between attempts. Only analysis failures consume the budget; store and
/// not-found errors fail immediately.
async fn generate_with_retries<C, R, A>(
    catalog: &C,
    reports: &R,
    ai: &A,
    product_id: Uuid,
    cfg: &ReportRunConfig,
) -> Result<ReportRecord, GenerateError>
where
    C: ProductCatalog,
    R: ReportStore,
    A: AnalysisProvider,
{
    let max_attempts = cfg.max_retries.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match generate_once(catalog, reports, ai, product_id).await {
            Ok(record) => return Ok(record),
            Err(GenerateError::Analysis(e)) => {
                warn!(
                    product_id = %product_id,
                    attempt,
                    error = %e,
                    "analysis attempt failed"
                );
                if attempt >= max_attempts {
                    return Err(GenerateError::Analysis(e));
                }
                tokio::time::sleep(cfg.retry_delay).await;
            }
            Err(other) => return Err(other),
        }
    }
}

/// Single-product entry point shared by the HTTP handler and the startup
/// batch (no fabricated request objects in between). Always regenerates.
pub async fn generate_report<C, R, A>(
    catalog: &C,
    reports: &R,
    ai: &A,
    product_id: Uuid,
) -> Result<ReportRecord, AppError>
where
    C: ProductCatalog,
    R: ReportStore,
    A: AnalysisProvider,
{
    generate_once(catalog, reports, ai, product_id)
        .await
        .map_err(|e| match e {
            GenerateError::NotFound(id) => AppError::not_found(format!("product {id}")),
            GenerateError::Analysis(e) => AppError::Analysis(e),
            GenerateError::Store(e) => AppError::Internal(e),
        })
}

/// Per-product body of the batch loop. Errors returned here are caught at
/// the call site and recorded as failures; they never abort the run.
async fn process_product<C, R, A>(
    catalog: &C,
    reports: &R,
    ai: &A,
    product: &ProductRef,
    cfg: &ReportRunConfig,
) -> Result<ProductStatus, GenerateError>
where
    C: ProductCatalog,
    R: ReportStore,
    A: AnalysisProvider,
{
    if let Some(existing) = reports.find_report(product.id).await? {
        if existing.updated_at > chrono::Utc::now() - cfg.staleness {
            info!(
                product_id = %product.id,
                title = %product.title,
                updated_at = %existing.updated_at,
                "skipping recent report"
            );
            return Ok(ProductStatus::Fresh);
        }
    }

    match generate_with_retries(catalog, reports, ai, product.id, cfg).await {
        Ok(_) => Ok(ProductStatus::Generated),
        Err(GenerateError::Analysis(e)) => {
            error!(
                product_id = %product.id,
                title = %product.title,
                error = %e,
                "all retries failed; writing fallback report"
            );
            reports
                .upsert_report(product.id, &ReportPayload::fallback())
                .await?;
            Ok(ProductStatus::FellBack)
        }
        Err(other) => Err(other),
    }
}

/// One full pass over all active products. Errors only when the product
/// list itself cannot be fetched; everything past that point is folded into
/// the summary.
pub async fn run_all<C, R, A>(
    catalog: &C,
    reports: &R,
    ai: &A,
    cfg: &ReportRunConfig,
) -> anyhow::Result<RunSummary>
where
    C: ProductCatalog,
    R: ReportStore,
    A: AnalysisProvider,
{
    let products = catalog.active_products().await?;
    if products.is_empty() {
        info!("no active products found to generate reports");
        return Ok(RunSummary::default());
    }

    info!(count = products.len(), "starting report generation run");
    let mut summary = RunSummary::default();

    for product in &products {
        info!(product_id = %product.id, title = %product.title, "processing product");
        match process_product(catalog, reports, ai, product, cfg).await {
            Ok(ProductStatus::Fresh) | Ok(ProductStatus::Generated) => {
                summary.successes.push(product.clone());
            }
            Ok(ProductStatus::FellBack) => {
                summary.failures.push(ReportFailure {
                    id: product.id,
                    title: product.title.clone(),
                    reason: "AI analysis failed after retries".to_string(),
                });
            }
            Err(e) => {
                error!(
                    product_id = %product.id,
                    title = %product.title,
                    error = %e,
                    "report generation failed"
                );
                summary.failures.push(ReportFailure {
                    id: product.id,
                    title: product.title.clone(),
                    reason: e.to_string(),
                });
            }
        }
        // Pace the external dependency regardless of outcome.
        tokio::time::sleep(cfg.inter_product_delay).await;
    }

    if summary.failures.is_empty() {
        info!(
            successes = summary.successes.len(),
            "all product reports updated successfully"
        );
    } else {
        warn!(
            successes = summary.successes.len(),
            failures = summary.failures.len(),
            "report run finished with failures"
        );
    }
    Ok(summary)
}

/// Operator repair path: regenerate reports for an explicit id list,
/// sequentially, without the freshness check and without fallback rows.
/// Every id yields an outcome even when some fail.
pub async fn retry_reports<C, R, A>(
    catalog: &C,
    reports: &R,
    ai: &A,
    product_ids: &[Uuid],
    cfg: &ReportRunConfig,
) -> Vec<RetryOutcome>
where
    C: ProductCatalog,
    R: ReportStore,
    A: AnalysisProvider,
{
    let mut outcomes = Vec::with_capacity(product_ids.len());
    for &product_id in product_ids {
        let result = match generate_with_retries(catalog, reports, ai, product_id, cfg).await {
            Ok(_) => RetryResult::Success {
                message: "Report generated successfully".to_string(),
            },
            Err(e) => {
                warn!(product_id = %product_id, error = %e, "retry failed");
                RetryResult::Failed {
                    reason: e.to_string(),
                }
            }
        };
        outcomes.push(RetryOutcome { product_id, result });
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ProductAnalysis, Sentiment, SentimentCounts};
    use crate::reports::{ProductView, RatingView};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeCatalog {
        products: Vec<ProductRef>,
        views: HashMap<Uuid, ProductView>,
    }

    impl FakeCatalog {
        fn with_products(n: usize) -> (Self, Vec<Uuid>) {
            let mut products = Vec::new();
            let mut views = HashMap::new();
            let mut ids = Vec::new();
            for i in 0..n {
                let id = Uuid::new_v4();
                ids.push(id);
                products.push(ProductRef {
                    id,
                    title: format!("product-{i}"),
                });
                views.insert(
                    id,
                    ProductView {
                        id,
                        title: format!("product-{i}"),
                        description: "handmade".into(),
                        average_rating: 4.0,
                        rating_count: 1,
                        ratings: vec![RatingView {
                            score: 4,
                            comment: None,
                        }],
                    },
                );
            }
            (Self { products, views }, ids)
        }
    }

    #[async_trait]
    impl ProductCatalog for FakeCatalog {
        async fn active_products(&self) -> anyhow::Result<Vec<ProductRef>> {
            Ok(self.products.clone())
        }

        async fn product_view(&self, product_id: Uuid) -> anyhow::Result<Option<ProductView>> {
            Ok(self.views.get(&product_id).cloned())
        }
    }

    #[derive(Default)]
    struct FakeReports {
        rows: Mutex<HashMap<Uuid, ReportRecord>>,
        upserts: AtomicUsize,
    }

    impl FakeReports {
        fn seed(&self, product_id: Uuid, age: chrono::Duration) {
            let record = ReportRecord {
                id: Uuid::new_v4(),
                product_id,
                overall_score: 50.0,
                summary: "seed".into(),
                strengths: Vec::new(),
                weaknesses: Vec::new(),
                suggestions: Vec::new(),
                sentiment: Sentiment::Neutral,
                rating_distribution: Default::default(),
                sentiment_counts: SentimentCounts::default(),
                updated_at: Utc::now() - age,
            };
            self.rows.lock().unwrap().insert(product_id, record);
        }

        fn row(&self, product_id: Uuid) -> Option<ReportRecord> {
            self.rows.lock().unwrap().get(&product_id).cloned()
        }
    }

    #[async_trait]
    impl ReportStore for FakeReports {
        async fn upsert_report(
            &self,
            product_id: Uuid,
            payload: &ReportPayload,
        ) -> anyhow::Result<ReportRecord> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            let record = ReportRecord {
                id: Uuid::new_v4(),
                product_id,
                overall_score: payload.overall_score,
                summary: payload.summary.clone(),
                strengths: payload.strengths.clone(),
                weaknesses: payload.weaknesses.clone(),
                suggestions: payload.suggestions.clone(),
                sentiment: payload.sentiment,
                rating_distribution: payload.rating_distribution.clone(),
                sentiment_counts: payload.sentiment_counts,
                updated_at: Utc::now(),
            };
            self.rows
                .lock()
                .unwrap()
                .insert(product_id, record.clone());
            Ok(record)
        }

        async fn find_report(&self, product_id: Uuid) -> anyhow::Result<Option<ReportRecord>> {
            Ok(self.rows.lock().unwrap().get(&product_id).cloned())
        }
    }

    #[derive(Default)]
    struct FakeAi {
        calls: AtomicUsize,
        fail_ids: Vec<Uuid>,
    }

    impl FakeAi {
        fn failing_for(ids: Vec<Uuid>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_ids: ids,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalysisProvider for FakeAi {
        async fn analyze(
            &self,
            product: &ProductView,
        ) -> Result<ProductAnalysis, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.contains(&product.id) {
                return Err(AnalysisError::Other("model unavailable".into()));
            }
            Ok(ProductAnalysis {
                score: 75.0,
                summary: "solid product".into(),
                strengths: vec!["quality".into()],
                weaknesses: Vec::new(),
                suggestions: Vec::new(),
                sentiment: Sentiment::Positive,
                sentiment_analysis: SentimentCounts {
                    positive: 1,
                    neutral: 0,
                    negative: 0,
                },
            })
        }
    }

    fn fast_cfg() -> ReportRunConfig {
        ReportRunConfig {
            max_retries: 3,
            retry_delay: Duration::ZERO,
            inter_product_delay: Duration::ZERO,
            staleness: chrono::Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn empty_product_list_is_a_noop() {
        let (catalog, _) = FakeCatalog::with_products(0);
        let reports = FakeReports::default();
        let ai = FakeAi::default();

        let summary = run_all(&catalog, &reports, &ai, &fast_cfg()).await.unwrap();
        assert!(summary.successes.is_empty());
        assert!(summary.failures.is_empty());
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn fresh_report_is_skipped_without_an_ai_call() {
        let (catalog, ids) = FakeCatalog::with_products(1);
        let reports = FakeReports::default();
        reports.seed(ids[0], chrono::Duration::hours(23));
        let ai = FakeAi::default();

        let summary = run_all(&catalog, &reports, &ai, &fast_cfg()).await.unwrap();
        assert_eq!(summary.successes.len(), 1);
        assert!(summary.failures.is_empty());
        assert_eq!(ai.call_count(), 0);
        assert_eq!(reports.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_report_triggers_regeneration() {
        let (catalog, ids) = FakeCatalog::with_products(1);
        let reports = FakeReports::default();
        reports.seed(ids[0], chrono::Duration::hours(25));
        let ai = FakeAi::default();

        let summary = run_all(&catalog, &reports, &ai, &fast_cfg()).await.unwrap();
        assert_eq!(summary.successes.len(), 1);
        assert_eq!(ai.call_count(), 1);
        let row = reports.row(ids[0]).unwrap();
        assert_eq!(row.overall_score, 75.0);
    }

    #[tokio::test]
    async fn exhausted_retries_write_one_fallback_and_one_failure() {
        let (catalog, ids) = FakeCatalog::with_products(1);
        let reports = FakeReports::default();
        let ai = FakeAi::failing_for(vec![ids[0]]);

        let summary = run_all(&catalog, &reports, &ai, &fast_cfg()).await.unwrap();
        assert_eq!(ai.call_count(), 3);
        assert!(summary.successes.is_empty());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].reason, "AI analysis failed after retries");

        // One upsert: the fallback row.
        assert_eq!(reports.upserts.load(Ordering::SeqCst), 1);
        let row = reports.row(ids[0]).unwrap();
        assert_eq!(row.overall_score, 0.0);
        assert_eq!(row.sentiment, Sentiment::Neutral);
        assert!(row.strengths.is_empty());
        assert_eq!(row.sentiment_counts, SentimentCounts::default());
    }

    #[tokio::test]
    async fn one_failing_product_does_not_abort_the_run() {
        let (catalog, ids) = FakeCatalog::with_products(3);
        let reports = FakeReports::default();
        let ai = FakeAi::failing_for(vec![ids[1]]);

        let summary = run_all(&catalog, &reports, &ai, &fast_cfg()).await.unwrap();
        let success_ids: Vec<Uuid> = summary.successes.iter().map(|p| p.id).collect();
        assert_eq!(success_ids, vec![ids[0], ids[2]]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].id, ids[1]);
        // Products 1 and 3 succeed first try; product 2 burns the full budget.
        assert_eq!(ai.call_count(), 5);
    }

    #[tokio::test]
    async fn retry_adapter_returns_independent_ordered_outcomes() {
        let (catalog, ids) = FakeCatalog::with_products(2);
        let reports = FakeReports::default();
        let ai = FakeAi::failing_for(vec![ids[1]]);

        let outcomes =
            retry_reports(&catalog, &reports, &ai, &[ids[0], ids[1]], &fast_cfg()).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].product_id, ids[0]);
        assert!(matches!(outcomes[0].result, RetryResult::Success { .. }));
        assert_eq!(outcomes[1].product_id, ids[1]);
        assert!(matches!(outcomes[1].result, RetryResult::Failed { .. }));
        // No fallback row for the failing id on the manual path.
        assert!(reports.row(ids[1]).is_none());
    }

    #[tokio::test]
    async fn retry_adapter_ignores_freshness() {
        let (catalog, ids) = FakeCatalog::with_products(1);
        let reports = FakeReports::default();
        reports.seed(ids[0], chrono::Duration::hours(1));
        let ai = FakeAi::default();

        let outcomes = retry_reports(&catalog, &reports, &ai, &[ids[0]], &fast_cfg()).await;
        assert!(matches!(outcomes[0].result, RetryResult::Success { .. }));
        assert_eq!(ai.call_count(), 1);
    }

    #[tokio::test]
    async fn retry_adapter_reports_unknown_ids_as_failures() {
        let (catalog, _) = FakeCatalog::with_products(0);
        let reports = FakeReports::default();
        let ai = FakeAi::default();
        let ghost = Uuid::new_v4();

        let outcomes = retry_reports(&catalog, &reports, &ai, &[ghost], &fast_cfg()).await;
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0].result {
            RetryResult::Failed { reason } => assert!(reason.contains("not found")),
            other => panic!("expected failure, got {other:?}"),
        }
        // Unknown ids never reach the model.
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn single_generation_maps_missing_product_to_not_found() {
        let (catalog, _) = FakeCatalog::with_products(0);
        let reports = FakeReports::default();
        let ai = FakeAi::default();

        let err = generate_report(&catalog, &reports, &ai, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
