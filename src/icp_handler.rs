//! ICP (Ideal Customer Profile) reference-data endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::errors::AppError;
use crate::export::icp_to_csv;
use crate::handlers::{csv_attachment, AppState};
use crate::models::{
    parse_id, DataResponse, ExportedIcp, IcpCategory, IcpData, IcpDataQueryParams, IcpDataView,
    NewIcpCategory, NewIcpData,
};
use crate::storage::IcpDataFilter;
use crate::validation::{validate_new_category, validate_new_icp_data};

fn require_object(patch: &Value) -> Result<(), AppError> {
    if patch.is_object() {
        Ok(())
    } else {
        Err(AppError::invalid("Update body must be a JSON object"))
    }
}

// ============ Categories ============

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse<Vec<IcpCategory>>>, AppError> {
    let categories = state.icp.list_categories().await?;
    tracing::debug!("Listing {} ICP categories", categories.len());
    Ok(Json(DataResponse::ok(categories)))
}

/// POST /api/icp/categories
///
/// `title` is required and unique; a taken title answers 409.
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewIcpCategory>,
) -> Result<(StatusCode, Json<DataResponse<IcpCategory>>), AppError> {
    let (title, definition) = validate_new_category(body)?;
    tracing::info!("POST /api/icp/categories - '{}'", title);

    let category = state.icp.create_category(title, definition).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::ok(category))))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<DataResponse<IcpCategory>>, AppError> {
    let id = parse_id(&raw_id, "category")?;
    let category = state.icp.get_category(id).await?;
    Ok(Json(DataResponse::ok(category)))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<DataResponse<IcpCategory>>, AppError> {
    let id = parse_id(&raw_id, "category")?;
    require_object(&patch)?;
    tracing::info!("PATCH /api/icp/categories/{}", id);

    let category = state.icp.update_category(id, &patch).await?;
    Ok(Json(DataResponse::ok(category)))
}

/// Rows that pointed at the category stay and export as "Unknown".
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&raw_id, "category")?;
    tracing::info!("DELETE /api/icp/categories/{}", id);

    let deleted = state.icp.delete_category(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Category deleted successfully",
        "data": deleted,
    })))
}

// ============ Data rows ============

/// GET /api/icp/data
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - Optional `category` id and `search` text.
///
/// # Returns
///
/// * `Result<Json<DataResponse<Vec<IcpDataView>>>, AppError>` - Rows sorted by
///   attribute with their category resolved.
pub async fn list_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IcpDataQueryParams>,
) -> Result<Json<DataResponse<Vec<IcpDataView>>>, AppError> {
    let filter = IcpDataFilter::try_from(&params)?;
    tracing::info!("GET /api/icp/data - filter: {:?}", filter);

    let rows = state.icp.list_data(&filter).await?;
    Ok(Json(DataResponse::ok(rows)))
}

/// POST /api/icp/data
///
/// The referenced category is checked before anything is written.
pub async fn create_data(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewIcpData>,
) -> Result<(StatusCode, Json<DataResponse<IcpData>>), AppError> {
    let draft = validate_new_icp_data(body)?;
    tracing::info!(
        "POST /api/icp/data - {}={} in {}",
        draft.attribute,
        draft.value,
        draft.icp_category
    );

    let data = state.icp.create_data(draft).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::ok(data))))
}

pub async fn get_data(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<DataResponse<IcpDataView>>, AppError> {
    let id = parse_id(&raw_id, "data")?;
    let view = state.icp.get_data(id).await?;
    Ok(Json(DataResponse::ok(view)))
}

pub async fn update_data(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<DataResponse<IcpData>>, AppError> {
    let id = parse_id(&raw_id, "data")?;
    require_object(&patch)?;
    tracing::info!("PATCH /api/icp/data/{}", id);

    let data = state.icp.update_data(id, &patch).await?;
    Ok(Json(DataResponse::ok(data)))
}

pub async fn delete_data(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&raw_id, "data")?;
    tracing::info!("DELETE /api/icp/data/{}", id);

    let deleted = state.icp.delete_data(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "ICP data deleted successfully",
        "data": deleted,
    })))
}

/// GET /api/icp/export
///
/// Flattened rows, JSON by default or CSV with `format=csv`.
pub async fn export_icp(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IcpDataQueryParams>,
) -> Result<Response, AppError> {
    let filter = IcpDataFilter::try_from(&params)?;
    let rows: Vec<ExportedIcp> = state
        .icp
        .list_data(&filter)
        .await?
        .iter()
        .map(ExportedIcp::from)
        .collect();
    tracing::info!("GET /api/icp/export - {} rows", rows.len());

    let wants_csv = params
        .format
        .as_deref()
        .is_some_and(|format| format.eq_ignore_ascii_case("csv"));
    if wants_csv {
        let body = icp_to_csv(&rows)?;
        return Ok(csv_attachment(body, "icp-export.csv"));
    }

    Ok(Json(DataResponse::ok(rows)).into_response())
}
