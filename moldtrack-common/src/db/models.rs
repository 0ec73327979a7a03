//! Read models for the inspection entity graph
//!
//! These are the shapes returned by the query layer and serialized by the
//! HTTP API: a flat row per entity plus the nested `InspectionDetail`
//! aggregate (inspection with machine state, detections, defects and
//! severities).

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;

/// One quality-check event
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Inspection {
    pub id: i64,
    pub version: String,
    pub timestamp: NaiveDateTime,
    pub molding_machine_id: String,
}

/// Machine telemetry snapshot at inspection time (one per inspection)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MachineState {
    pub id: i64,
    pub inspection_id: i64,
    pub cycle_time: Option<f64>,
    pub inj_peak_pressure: Option<f64>,
    pub barrel1: Option<f64>,
    pub barrel2: Option<f64>,
    pub barrel3: Option<f64>,
    pub barrel4: Option<f64>,
    pub barrel5: Option<f64>,
    pub barrel6: Option<f64>,
    /// Any other machine-reported fields, stored verbatim as JSON
    pub extra: Option<Json<Map<String, Value>>>,
}

/// Quantitative measurement backing a defect's reject verdict
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PixelSeverity {
    pub id: i64,
    pub reject: bool,
    pub value: f64,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub threshold: Option<f64>,
}

/// One defect finding, with its severity measurement
#[derive(Debug, Clone, Serialize)]
pub struct DefectDetail {
    pub id: i64,
    pub defect_type: String,
    pub reject: bool,
    pub pixel_severity: PixelSeverity,
}

/// One detected object/region within an inspection
#[derive(Debug, Clone, Serialize)]
pub struct DetectionDetail {
    pub id: i64,
    pub name: String,
    pub reject: bool,
    pub defects: Vec<DefectDetail>,
}

/// Full inspection aggregate: inspection plus its entire child graph
#[derive(Debug, Clone, Serialize)]
pub struct InspectionDetail {
    pub id: i64,
    pub version: String,
    pub timestamp: NaiveDateTime,
    pub molding_machine_id: String,
    pub machine_state: Option<MachineState>,
    pub object_detections: Vec<DetectionDetail>,
}
