//! Analytics endpoints
//!
//! Thin wrappers over `moldtrack_common::db::analytics`; every endpoint
//! accepts the same optional start/end/machine filters.

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDateTime;
use moldtrack_common::db::analytics::{
    self, AnalyticsFilter, DefectDistribution, Granularity, MachinePerformance, SummaryMetrics,
    TrendBucket,
};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub machine_id: Option<String>,
}

impl From<AnalyticsQuery> for AnalyticsFilter {
    fn from(query: AnalyticsQuery) -> Self {
        AnalyticsFilter {
            start: query.start_date,
            end: query.end_date,
            machine_id: query.machine_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    #[serde(default = "default_grouping")]
    pub grouping: Granularity,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub machine_id: Option<String>,
}

fn default_grouping() -> Granularity {
    Granularity::Day
}

#[derive(Debug, Serialize)]
pub struct TrendsResponse {
    pub trends: Vec<TrendBucket>,
    pub grouping: Granularity,
}

/// GET /api/analytics/defect-trends
pub async fn defect_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<TrendsResponse>, ApiError> {
    let filter = AnalyticsFilter {
        start: query.start_date,
        end: query.end_date,
        machine_id: query.machine_id,
    };
    let trends = analytics::defect_trends(&state.db, query.grouping, &filter).await?;
    Ok(Json(TrendsResponse {
        trends,
        grouping: query.grouping,
    }))
}

#[derive(Debug, Serialize)]
pub struct MachinesResponse {
    pub machines: Vec<MachinePerformance>,
}

/// GET /api/analytics/machine-performance
pub async fn machine_performance(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<MachinesResponse>, ApiError> {
    let machines = analytics::machine_performance(&state.db, &query.into()).await?;
    Ok(Json(MachinesResponse { machines }))
}

/// GET /api/analytics/defect-distribution
pub async fn defect_distribution(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<DefectDistribution>, ApiError> {
    let distribution = analytics::defect_distribution(&state.db, &query.into()).await?;
    Ok(Json(distribution))
}

/// GET /api/analytics/summary
pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<SummaryMetrics>, ApiError> {
    let metrics = analytics::summary_metrics(&state.db, &query.into()).await?;
    Ok(Json(metrics))
}
