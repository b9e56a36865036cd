// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        // API v1 routes (all require authentication)
        .service(
            web::scope("/api/v1")
                // Products and ratings
                .route("/products/{id}", web::get().to(handlers::get_product))
                .route("/products/{id}", web::put().to(handlers::update_product))
                .route(
                    "/products/{id}/ratings",
                    web::post().to(handlers::add_rating),
                )
                .route(
                    "/products/{id}/ratings/bulk",
                    web::post().to(handlers::add_bulk_ratings),
                )
                .route(
                    "/products/{id}/ratings",
                    web::get().to(handlers::get_product_ratings),
                )
                // Quality reports
                .route("/products/{id}/report", web::get().to(handlers::get_report))
                .route(
                    "/products/{id}/report",
                    web::post().to(handlers::generate_report),
                )
                .route("/reports/retry", web::post().to(handlers::retry_reports))
                // Moderation
                .route("/users/{id}/warn", web::post().to(handlers::warn_user)),
        );
}
