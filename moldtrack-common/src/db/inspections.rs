//! Inspection listing and lookup queries
//!
//! Pages through inspections newest-first and batch-loads the child graph
//! (machine state, detections, defects, severities) for each page, so one
//! page costs a fixed four queries regardless of page size.

use crate::db::models::{
    DefectDetail, DetectionDetail, Inspection, InspectionDetail, MachineState, PixelSeverity,
};
use crate::Result;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;

/// Optional filters applied to inspection listing
#[derive(Debug, Clone, Default)]
pub struct InspectionFilter {
    /// Only inspections produced by this machine
    pub machine_id: Option<String>,
    /// true: only inspections with at least one defect;
    /// false: only inspections with none
    pub has_defects: Option<bool>,
}

const HAS_DEFECTS_SQL: &str = "EXISTS (
    SELECT 1 FROM object_detections od
    JOIN defects d ON d.object_detection_id = od.id
    WHERE od.inspection_id = i.id)";

fn filter_clause(filter: &InspectionFilter) -> String {
    let mut conditions = Vec::new();
    if filter.machine_id.is_some() {
        conditions.push("i.molding_machine_id = ?".to_string());
    }
    match filter.has_defects {
        Some(true) => conditions.push(HAS_DEFECTS_SQL.to_string()),
        Some(false) => conditions.push(format!("NOT {}", HAS_DEFECTS_SQL)),
        None => {}
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

/// List one page of inspections (timestamp descending, insertion order on
/// ties) with their full child graphs. Returns the page plus the total
/// number of matching inspections.
pub async fn list_inspections(
    pool: &SqlitePool,
    filter: &InspectionFilter,
    page: i64,
    page_size: i64,
) -> Result<(Vec<InspectionDetail>, i64)> {
    let clause = filter_clause(filter);

    let count_sql = format!("SELECT COUNT(*) FROM product_inspections i{}", clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(machine_id) = &filter.machine_id {
        count_query = count_query.bind(machine_id);
    }
    let total = count_query.fetch_one(pool).await?;

    let page_sql = format!(
        "SELECT i.id, i.version, i.timestamp, i.molding_machine_id
         FROM product_inspections i{}
         ORDER BY i.timestamp DESC, i.id DESC
         LIMIT ? OFFSET ?",
        clause
    );
    let mut page_query = sqlx::query_as::<_, Inspection>(&page_sql);
    if let Some(machine_id) = &filter.machine_id {
        page_query = page_query.bind(machine_id);
    }
    let inspections = page_query
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(pool)
        .await?;

    let details = load_details(pool, inspections).await?;
    Ok((details, total))
}

/// Fetch one inspection aggregate by id, or None if it does not exist
pub async fn get_inspection(pool: &SqlitePool, id: i64) -> Result<Option<InspectionDetail>> {
    let inspection = sqlx::query_as::<_, Inspection>(
        "SELECT id, version, timestamp, molding_machine_id
         FROM product_inspections WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match inspection {
        Some(inspection) => {
            let mut details = load_details(pool, vec![inspection]).await?;
            Ok(details.pop())
        }
        None => Ok(None),
    }
}

/// Count inspections recorded for one machine
pub async fn count_for_machine(pool: &SqlitePool, machine_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM product_inspections WHERE molding_machine_id = ?",
    )
    .bind(machine_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

#[derive(Debug, FromRow)]
struct DetectionRow {
    id: i64,
    inspection_id: i64,
    name: String,
    reject: bool,
}

#[derive(Debug, FromRow)]
struct DefectRow {
    id: i64,
    object_detection_id: i64,
    defect_type: String,
    reject: bool,
    ps_id: i64,
    ps_reject: bool,
    value: f64,
    min_value: Option<f64>,
    max_value: Option<f64>,
    threshold: Option<f64>,
}

fn id_list(ids: impl Iterator<Item = i64>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

/// Batch-load child entities for a set of inspections and assemble the
/// nested aggregates, preserving input order.
async fn load_details(
    pool: &SqlitePool,
    inspections: Vec<Inspection>,
) -> Result<Vec<InspectionDetail>> {
    if inspections.is_empty() {
        return Ok(Vec::new());
    }

    // Ids come from our own queries, so inlining them is safe
    let inspection_ids = id_list(inspections.iter().map(|i| i.id));

    let states = sqlx::query_as::<_, MachineState>(&format!(
        "SELECT id, inspection_id, cycle_time, inj_peak_pressure,
                barrel1, barrel2, barrel3, barrel4, barrel5, barrel6, extra
         FROM machine_states WHERE inspection_id IN ({})",
        inspection_ids
    ))
    .fetch_all(pool)
    .await?;
    let mut states_by_inspection: HashMap<i64, MachineState> = states
        .into_iter()
        .map(|s| (s.inspection_id, s))
        .collect();

    let detections = sqlx::query_as::<_, DetectionRow>(&format!(
        "SELECT id, inspection_id, name, reject
         FROM object_detections WHERE inspection_id IN ({})
         ORDER BY id",
        inspection_ids
    ))
    .fetch_all(pool)
    .await?;

    let mut defects_by_detection: HashMap<i64, Vec<DefectDetail>> = HashMap::new();
    if !detections.is_empty() {
        let detection_ids = id_list(detections.iter().map(|d| d.id));
        let defects = sqlx::query_as::<_, DefectRow>(&format!(
            "SELECT d.id, d.object_detection_id, d.defect_type, d.reject,
                    p.id AS ps_id, p.reject AS ps_reject, p.value,
                    p.min_value, p.max_value, p.threshold
             FROM defects d
             JOIN pixel_severities p ON p.defect_id = d.id
             WHERE d.object_detection_id IN ({})
             ORDER BY d.id",
            detection_ids
        ))
        .fetch_all(pool)
        .await?;

        for row in defects {
            defects_by_detection
                .entry(row.object_detection_id)
                .or_default()
                .push(DefectDetail {
                    id: row.id,
                    defect_type: row.defect_type,
                    reject: row.reject,
                    pixel_severity: PixelSeverity {
                        id: row.ps_id,
                        reject: row.ps_reject,
                        value: row.value,
                        min_value: row.min_value,
                        max_value: row.max_value,
                        threshold: row.threshold,
                    },
                });
        }
    }

    let mut detections_by_inspection: HashMap<i64, Vec<DetectionDetail>> = HashMap::new();
    for row in detections {
        detections_by_inspection
            .entry(row.inspection_id)
            .or_default()
            .push(DetectionDetail {
                id: row.id,
                name: row.name,
                reject: row.reject,
                defects: defects_by_detection.remove(&row.id).unwrap_or_default(),
            });
    }

    Ok(inspections
        .into_iter()
        .map(|inspection| InspectionDetail {
            machine_state: states_by_inspection.remove(&inspection.id),
            object_detections: detections_by_inspection
                .remove(&inspection.id)
                .unwrap_or_default(),
            id: inspection.id,
            version: inspection.version,
            timestamp: inspection.timestamp,
            molding_machine_id: inspection.molding_machine_id,
        })
        .collect())
}
