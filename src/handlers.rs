use crate::analytics::{calculate_analytics, AnalyticsData, LeadStats};
use crate::config::Config;
use crate::errors::AppError;
use crate::export::{leads_to_csv, normalized_lead, FormatParams};
use crate::filters::{LeadQuery, LeadQueryParams, ViewFilter, ViewQueryParams};
use crate::models::*;
use crate::storage::{IcpRepository, LeadRepository};
use crate::validation::prepare_new_lead;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use moka::future::Cache;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lead document store.
    pub leads: Arc<dyn LeadRepository>,
    /// ICP categories and data rows.
    pub icp: Arc<dyn IcpRepository>,
    /// Application configuration.
    pub config: Config,
    /// Analytics responses keyed by lead generation and normalized query
    /// (see `LeadQuery::cache_key`). Cleared on every lead write.
    pub analytics_cache: Cache<String, AnalyticsData>,
    /// Bumped on every lead write; part of each analytics cache key.
    lead_generation: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(
        config: Config,
        leads: Arc<dyn LeadRepository>,
        icp: Arc<dyn IcpRepository>,
    ) -> Self {
        let analytics_cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.analytics_cache_ttl_secs))
            .max_capacity(1_000)
            .build();
        Self {
            leads,
            icp,
            config,
            analytics_cache,
            lead_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cache key for `query` under the current lead generation. Read it
    /// before fetching: a result computed while a write lands is stored
    /// under a generation no later request looks up.
    pub fn analytics_key(&self, query: &LeadQuery) -> String {
        format!(
            "{}:{}",
            self.lead_generation.load(Ordering::Acquire),
            query.cache_key()
        )
    }

    pub fn invalidate_analytics(&self) {
        self.lead_generation.fetch_add(1, Ordering::AcqRel);
        self.analytics_cache.invalidate_all();
    }
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-qualification-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/leads
///
/// Filtered lead list, newest first, with summary stats over the returned
/// page.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - `isQualified`, `scoreMin`, `scoreMax`, `dateFrom`, `dateTo`,
///   `status`, `limit`, `offset`.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadQueryParams>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /api/leads - params: {:?}", params);

    let query = LeadQuery::try_from(params)?;
    let leads = state.leads.find(&query).await?;
    let stats = LeadStats::from_leads(&leads);

    Ok(Json(json!({
        "success": true,
        "leads": leads,
        "stats": stats,
    })))
}

/// POST /api/leads
///
/// Validates the body, rejects duplicate emails with 409 and returns the
/// stored lead with 201.
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<LeadWriteResponse>), AppError> {
    let lead = prepare_new_lead(body)?;
    tracing::info!("POST /api/leads - {}", lead.lead_info.lead_email);

    let created = state.leads.create(lead).await?;
    state.invalidate_analytics();

    tracing::info!(
        "Lead created: id={}, status={}, score={}",
        created.id,
        created.status,
        created.lead_score
    );

    Ok((
        StatusCode::CREATED,
        Json(LeadWriteResponse {
            success: true,
            message: "Lead created successfully".to_string(),
            data: Some(created),
        }),
    ))
}

/// GET /api/leads/browse
///
/// Search and quick filters applied to the full newest-first list.
pub async fn browse_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewQueryParams>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /api/leads/browse - params: {:?}", params);

    let view = ViewFilter::try_from(params)?;
    let leads = state.leads.find(&LeadQuery::all()).await?;
    let visible = view.apply(&leads);

    Ok(Json(json!({
        "success": true,
        "leads": visible,
    })))
}

pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<DataResponse<Lead>>, AppError> {
    let id = parse_id(&raw_id, "lead")?;
    tracing::info!("GET /api/leads/{}", id);

    let lead = state.leads.get(id).await?;
    Ok(Json(DataResponse::ok(lead)))
}

/// PATCH /api/leads/:id
///
/// Merge-patches the stored document. Storage-owned fields in the body are
/// ignored and the result is re-validated before it is written.
pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<LeadWriteResponse>, AppError> {
    let id = parse_id(&raw_id, "lead")?;
    if !patch.is_object() {
        return Err(AppError::invalid("Update body must be a JSON object"));
    }
    tracing::info!("PATCH /api/leads/{}", id);

    let updated = state.leads.update(id, &patch).await?;
    state.invalidate_analytics();

    Ok(Json(LeadWriteResponse {
        success: true,
        message: "Lead updated successfully".to_string(),
        data: Some(updated),
    }))
}

pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<LeadWriteResponse>, AppError> {
    let id = parse_id(&raw_id, "lead")?;
    tracing::info!("DELETE /api/leads/{}", id);

    state.leads.delete(id).await?;
    state.invalidate_analytics();

    Ok(Json(LeadWriteResponse {
        success: true,
        message: "Lead deleted successfully".to_string(),
        data: None,
    }))
}

/// GET /api/analytics
///
/// Dashboard aggregates over every lead matching the filters; `limit` and
/// `offset` narrow the input only when given. Responses are cached per
/// normalized query.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - Same filters as the list endpoint.
///
/// # Returns
///
/// * `Result<Json<AnalyticsData>, AppError>` - Aggregates, all zero for no matches.
pub async fn analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadQueryParams>,
) -> Result<Json<AnalyticsData>, AppError> {
    let query = LeadQuery::try_from(params)?;
    let key = state.analytics_key(&query);

    if let Some(cached) = state.analytics_cache.get(&key).await {
        tracing::debug!("Analytics cache hit: {}", key);
        return Ok(Json(cached));
    }

    let leads = state.leads.find(&query).await?;
    let data = calculate_analytics(&leads);
    tracing::info!(
        "Analytics computed over {} leads (qualification rate {}%)",
        data.total_leads,
        data.qualification_rate
    );

    state.analytics_cache.insert(key, data.clone()).await;
    Ok(Json(data))
}

/// GET /api/export
///
/// Filtered leads with empty optional fields normalized, as `{ok, data}`
/// JSON or, with `format=csv`, as a CSV attachment.
pub async fn export_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadQueryParams>,
    Query(format): Query<FormatParams>,
) -> Result<Response, AppError> {
    tracing::info!("GET /api/export - params: {:?}, format: {:?}", params, format.format);

    let query = LeadQuery::try_from(params)?.paginated();
    let leads = state.leads.find(&query).await?;

    if format.wants_csv() {
        let body = leads_to_csv(&leads)?;
        return Ok(csv_attachment(body, "leads-export.csv"));
    }

    let data: Vec<Value> = leads.iter().map(normalized_lead).collect();
    Ok(Json(json!({ "ok": true, "data": data })).into_response())
}

/// CSV body served as a download.
pub(crate) fn csv_attachment(body: String, filename: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn state() -> AppState {
        let storage = Arc::new(MemoryStorage::new());
        AppState::new(Config::in_memory(), storage.clone(), storage)
    }

    #[tokio::test]
    async fn result_computed_across_a_write_is_never_served() {
        let state = state();
        let query = LeadQuery::all();

        // Key taken before the fetch, write lands before the insert
        let stale_key = state.analytics_key(&query);
        state.invalidate_analytics();
        state
            .analytics_cache
            .insert(stale_key.clone(), calculate_analytics(&[]))
            .await;

        let fresh_key = state.analytics_key(&query);
        assert_ne!(fresh_key, stale_key);
        assert!(state.analytics_cache.get(&fresh_key).await.is_none());
    }

    #[test]
    fn analytics_key_is_stable_without_writes() {
        let state = state();
        let query = LeadQuery::all();
        assert_eq!(state.analytics_key(&query), state.analytics_key(&query));
    }
}
