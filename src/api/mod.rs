//! Route table.
//!
//! `/health` sits outside the API group so deployment probes are never rate
//! limited; `main` wraps [`api_routes`] in the governor layer.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};
use crate::icp_handler;

/// Request size limit: 5MB max payload.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Every `/api` endpoint, state not yet attached.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Leads
        .route(
            "/api/leads",
            get(handlers::list_leads).post(handlers::create_lead),
        )
        .route("/api/leads/browse", get(handlers::browse_leads))
        .route(
            "/api/leads/:id",
            get(handlers::get_lead)
                .patch(handlers::update_lead)
                .delete(handlers::delete_lead),
        )
        .route("/api/analytics", get(handlers::analytics))
        .route("/api/export", get(handlers::export_leads))
        // ICP reference data
        .route(
            "/api/icp/categories",
            get(icp_handler::list_categories).post(icp_handler::create_category),
        )
        .route(
            "/api/icp/categories/:id",
            get(icp_handler::get_category)
                .patch(icp_handler::update_category)
                .delete(icp_handler::delete_category),
        )
        .route(
            "/api/icp/data",
            get(icp_handler::list_data).post(icp_handler::create_data),
        )
        .route(
            "/api/icp/data/:id",
            get(icp_handler::get_data)
                .patch(icp_handler::update_data)
                .delete(icp_handler::delete_data),
        )
        .route("/api/icp/export", get(icp_handler::export_icp))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// Assembles the application around an already-layered API group.
pub fn app(state: Arc<AppState>, api: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Application without rate limiting, as used by the integration tests.
pub fn router(state: Arc<AppState>) -> Router {
    app(state, api_routes())
}
