// HTTP request handlers for API endpoints

use actix_web::{web, HttpResponse};
use serde_json::Value;
use uuid::Uuid;

use crate::api::models::*;
use crate::api::server::{ReportState, StartTime};
use crate::error::AppError;
use crate::notify::Mailer;
use crate::reports::{pipeline, ReportStore};
use crate::store::{Db, NewRating, ProductUpdate};

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>, start: web::Data<StartTime>) -> HttpResponse {
    let db_status = match db.ping().await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    HttpResponse::Ok().json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        uptime_seconds: start.uptime_seconds(),
    }))
}

pub async fn get_product(
    path: web::Path<Uuid>,
    db: web::Data<Db>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let product = db
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("product {product_id}")))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(product)))
}

// Fields derived from the rating set; writable only by the rating path.
const DERIVED_FIELDS: &[&str] = &[
    "average_rating",
    "averageRating",
    "rating_count",
    "ratingCount",
];

/// Reject update bodies that try to write the derived rating columns
/// directly, in either field-name spelling.
fn reject_derived_fields(body: &Value) -> Result<(), AppError> {
    if let Some(map) = body.as_object() {
        for field in DERIVED_FIELDS {
            if map.contains_key(*field) {
                return Err(AppError::validation(format!(
                    "field '{field}' is derived from ratings and cannot be set directly"
                )));
            }
        }
    }
    Ok(())
}

/// Update editable product fields. Requests that try to write the derived
/// rating columns directly are rejected before any parsing.
pub async fn update_product(
    path: web::Path<Uuid>,
    payload: web::Json<Value>,
    db: web::Data<Db>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let body = payload.into_inner();

    reject_derived_fields(&body)?;
    let update: ProductUpdate = serde_json::from_value(body)
        .map_err(|e| AppError::validation(format!("invalid product update: {e}")))?;

    let product = db.update_product(product_id, &update).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(product)))
}

pub async fn add_rating(
    path: web::Path<Uuid>,
    payload: web::Json<NewRating>,
    db: web::Data<Db>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let result = db.add_rating(product_id, &payload).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(result)))
}

pub async fn add_bulk_ratings(
    path: web::Path<Uuid>,
    payload: web::Json<BulkRatingRequest>,
    db: web::Data<Db>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let outcome = db.add_ratings_bulk(product_id, &payload.ratings).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(outcome)))
}

pub async fn get_product_ratings(
    path: web::Path<Uuid>,
    db: web::Data<Db>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let ratings = db.ratings_for_product(product_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ratings)))
}

pub async fn get_report(
    path: web::Path<Uuid>,
    db: web::Data<Db>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let report = db
        .find_report(product_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("report for product {product_id}")))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

/// Generate (or regenerate) the report for one product, synchronously.
pub async fn generate_report(
    path: web::Path<Uuid>,
    db: web::Data<Db>,
    state: web::Data<ReportState>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let gemini = state.gemini()?;
    let record =
        pipeline::generate_report(db.get_ref(), db.get_ref(), gemini, product_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(record)))
}

/// Regenerate reports for an explicit id list. Always 200 with per-id
/// outcomes; individual failures are data, not errors.
pub async fn retry_reports(
    payload: web::Json<RetryReportsRequest>,
    db: web::Data<Db>,
    state: web::Data<ReportState>,
) -> Result<HttpResponse, AppError> {
    if payload.product_ids.is_empty() {
        return Err(AppError::validation("product_ids must not be empty"));
    }
    let gemini = state.gemini()?;
    let outcomes = pipeline::retry_reports(
        db.get_ref(),
        db.get_ref(),
        gemini,
        &payload.product_ids,
        &state.run_cfg,
    )
    .await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(outcomes)))
}

/// Issue a moderation warning. The email goes out only after the state
/// change has committed, and its delivery never affects the response.
pub async fn warn_user(
    path: web::Path<Uuid>,
    db: web::Data<Db>,
    mailer: web::Data<Mailer>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let outcome = db.warn_user(user_id).await?;

    if outcome.deactivated {
        mailer.send(Mailer::deactivation_email(&outcome.email, &outcome.name));
    } else {
        mailer.send(Mailer::warning_email(
            &outcome.email,
            &outcome.name,
            outcome.warning_count,
        ));
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_snake_case_derived_fields() {
        let err = reject_derived_fields(&json!({"average_rating": 5.0})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("average_rating"));

        let err = reject_derived_fields(&json!({"rating_count": 10})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_camel_case_derived_fields() {
        assert!(reject_derived_fields(&json!({"averageRating": 5.0})).is_err());
        assert!(reject_derived_fields(&json!({"ratingCount": 10})).is_err());
    }

    #[test]
    fn allows_editable_fields_through() {
        let body = json!({
            "title": "Woven basket",
            "price": 24.5,
            "is_active": false
        });
        assert!(reject_derived_fields(&body).is_ok());
    }
}
