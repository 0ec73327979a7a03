//! Inspection listing and lookup endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use moldtrack_common::db::inspections;
use moldtrack_common::db::inspections::InspectionFilter;
use moldtrack_common::db::models::InspectionDetail;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::ApiError;
use crate::AppState;

const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub machine_id: Option<String>,
    pub has_defects: Option<bool>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
    pub inspections: Vec<InspectionDetail>,
}

/// GET /api/inspections
pub async fn list_inspections(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    if query.page < 1 {
        return Err(ApiError::BadRequest(format!(
            "page must be >= 1, got {}",
            query.page
        )));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&query.page_size) {
        return Err(ApiError::BadRequest(format!(
            "page_size must be in [1, {}], got {}",
            MAX_PAGE_SIZE, query.page_size
        )));
    }

    let filter = InspectionFilter {
        machine_id: query.machine_id,
        has_defects: query.has_defects,
    };
    let (details, total) =
        inspections::list_inspections(&state.db, &filter, query.page, query.page_size).await?;

    let total_pages = if total > 0 {
        (total + query.page_size - 1) / query.page_size
    } else {
        0
    };

    Ok(Json(ListResponse {
        page: query.page,
        page_size: query.page_size,
        total,
        total_pages,
        inspections: details,
    }))
}

/// GET /api/inspections/:id
pub async fn get_inspection(
    State(state): State<AppState>,
    Path(inspection_id): Path<i64>,
) -> Result<Json<InspectionDetail>, ApiError> {
    match inspections::get_inspection(&state.db, inspection_id).await? {
        Some(detail) => Ok(Json(detail)),
        None => Err(ApiError::NotFound(format!(
            "Inspection {} not found",
            inspection_id
        ))),
    }
}

/// GET /api/inspections/machine/:machine_id/count
pub async fn machine_inspection_count(
    State(state): State<AppState>,
    Path(machine_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let count = inspections::count_for_machine(&state.db, &machine_id).await?;
    Ok(Json(json!({
        "machine_id": machine_id,
        "inspection_count": count,
    })))
}
