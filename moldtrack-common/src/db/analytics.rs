//! Analytics aggregation queries
//!
//! Read-only aggregates over committed inspections. All four operations
//! accept the same optional filter set (inclusive timestamp range, machine
//! id) and count defects the same way: distinct defect rows, never
//! defect-bearing inspections. Every rate or percentage with a zero
//! denominator is reported as 0.0.

use crate::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Trend bucketing granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Week,
}

impl Granularity {
    /// SQL expression truncating an inspection timestamp to the bucket
    /// start. Weeks start on Monday.
    fn bucket_expr(self) -> &'static str {
        match self {
            Granularity::Hour => "strftime('%Y-%m-%d %H:00:00', i.timestamp)",
            Granularity::Day => "strftime('%Y-%m-%d 00:00:00', i.timestamp)",
            Granularity::Week => {
                "strftime('%Y-%m-%d 00:00:00', i.timestamp, '-6 days', 'weekday 1')"
            }
        }
    }
}

/// Optional filters shared by all analytics operations
#[derive(Debug, Clone, Default)]
pub struct AnalyticsFilter {
    /// Inclusive lower bound on inspection timestamp
    pub start: Option<NaiveDateTime>,
    /// Inclusive upper bound on inspection timestamp
    pub end: Option<NaiveDateTime>,
    /// Only inspections produced by this machine
    pub machine_id: Option<String>,
}

impl AnalyticsFilter {
    fn clause(&self) -> String {
        let mut conditions = Vec::new();
        if self.start.is_some() {
            conditions.push("i.timestamp >= ?");
        }
        if self.end.is_some() {
            conditions.push("i.timestamp <= ?");
        }
        if self.machine_id.is_some() {
            conditions.push("i.molding_machine_id = ?");
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }
}

macro_rules! bind_filter {
    ($query:expr, $filter:expr) => {{
        let mut query = $query;
        if let Some(start) = $filter.start {
            query = query.bind(start);
        }
        if let Some(end) = $filter.end {
            query = query.bind(end);
        }
        if let Some(machine_id) = &$filter.machine_id {
            query = query.bind(machine_id);
        }
        query
    }};
}

/// Defect rows reachable from inspection `i`, as a scalar subquery
const DEFECT_COUNT_SUBQUERY: &str = "(
    SELECT COUNT(d.id) FROM object_detections od
    JOIN defects d ON d.object_detection_id = od.id
    WHERE od.inspection_id = i.id)";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        round2(numerator as f64 / denominator as f64 * 100.0)
    } else {
        0.0
    }
}

fn parse_bucket(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| crate::Error::InvalidInput(format!("Bad bucket timestamp {}: {}", raw, e)))
}

/// One trend bucket: inspections and defect rows within one time period
#[derive(Debug, Clone, Serialize)]
pub struct TrendBucket {
    pub timestamp: NaiveDateTime,
    pub total_count: i64,
    pub defect_count: i64,
    pub defect_rate: f64,
}

/// Bucket inspections by `granularity` and report per-bucket inspection
/// counts, defect-row counts and defect rates, ascending by bucket start.
pub async fn defect_trends(
    pool: &SqlitePool,
    granularity: Granularity,
    filter: &AnalyticsFilter,
) -> Result<Vec<TrendBucket>> {
    let sql = format!(
        "SELECT {bucket} AS period,
                COUNT(i.id) AS total_count,
                COALESCE(SUM({defects}), 0) AS defect_count
         FROM product_inspections i{clause}
         GROUP BY period
         ORDER BY period",
        bucket = granularity.bucket_expr(),
        defects = DEFECT_COUNT_SUBQUERY,
        clause = filter.clause(),
    );

    let rows: Vec<(String, i64, i64)> =
        bind_filter!(sqlx::query_as(&sql), filter).fetch_all(pool).await?;

    rows.into_iter()
        .map(|(period, total_count, defect_count)| {
            Ok(TrendBucket {
                timestamp: parse_bucket(&period)?,
                total_count,
                defect_count,
                defect_rate: rate(defect_count, total_count),
            })
        })
        .collect()
}

#[derive(Debug, FromRow)]
struct PerformanceRow {
    machine_id: String,
    avg_cycle: Option<f64>,
    avg_pressure: Option<f64>,
    avg_temp: Option<f64>,
    total: i64,
    defects: i64,
}

/// Per-machine aggregate over the filtered inspections
#[derive(Debug, Clone, Serialize)]
pub struct MachinePerformance {
    pub machine_id: String,
    pub avg_cycle_time: Option<f64>,
    pub avg_injection_pressure: Option<f64>,
    pub avg_barrel_temp: Option<f64>,
    pub total_inspections: i64,
    pub defect_count: i64,
    pub defect_rate: f64,
}

/// Group inspections by machine and average their telemetry. Machines whose
/// inspections carry no telemetry still appear, with null averages.
pub async fn machine_performance(
    pool: &SqlitePool,
    filter: &AnalyticsFilter,
) -> Result<Vec<MachinePerformance>> {
    let sql = format!(
        "SELECT i.molding_machine_id AS machine_id,
                AVG(ms.cycle_time) AS avg_cycle,
                AVG(ms.inj_peak_pressure) AS avg_pressure,
                AVG((ms.barrel1 + ms.barrel2 + ms.barrel3 +
                     ms.barrel4 + ms.barrel5 + ms.barrel6) / 6.0) AS avg_temp,
                COUNT(i.id) AS total,
                COALESCE(SUM({defects}), 0) AS defects
         FROM product_inspections i
         LEFT JOIN machine_states ms ON ms.inspection_id = i.id{clause}
         GROUP BY i.molding_machine_id
         ORDER BY i.molding_machine_id",
        defects = DEFECT_COUNT_SUBQUERY,
        clause = filter.clause(),
    );

    let rows: Vec<PerformanceRow> =
        bind_filter!(sqlx::query_as(&sql), filter).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| MachinePerformance {
            machine_id: row.machine_id,
            avg_cycle_time: row.avg_cycle.map(round2),
            avg_injection_pressure: row.avg_pressure.map(round2),
            avg_barrel_temp: row.avg_temp.map(round2),
            total_inspections: row.total,
            defect_count: row.defects,
            defect_rate: rate(row.defects, row.total),
        })
        .collect())
}

/// One defect type's share of the filtered defect population
#[derive(Debug, Clone, Serialize)]
pub struct DefectTypeCount {
    pub defect_type: String,
    pub count: i64,
    pub percentage: f64,
}

/// Defect counts per type, ordered count-descending
#[derive(Debug, Clone, Serialize)]
pub struct DefectDistribution {
    pub distribution: Vec<DefectTypeCount>,
    pub total_defects: i64,
}

/// Group the filtered defects by type and report each type's count and
/// percentage of the total.
pub async fn defect_distribution(
    pool: &SqlitePool,
    filter: &AnalyticsFilter,
) -> Result<DefectDistribution> {
    let sql = format!(
        "SELECT d.defect_type, COUNT(d.id) AS count
         FROM defects d
         JOIN object_detections od ON d.object_detection_id = od.id
         JOIN product_inspections i ON od.inspection_id = i.id{clause}
         GROUP BY d.defect_type
         ORDER BY COUNT(d.id) DESC",
        clause = filter.clause(),
    );

    let rows: Vec<(String, i64)> =
        bind_filter!(sqlx::query_as(&sql), filter).fetch_all(pool).await?;

    let total_defects: i64 = rows.iter().map(|(_, count)| count).sum();
    let distribution = rows
        .into_iter()
        .map(|(defect_type, count)| DefectTypeCount {
            defect_type,
            count,
            percentage: rate(count, total_defects),
        })
        .collect();

    Ok(DefectDistribution {
        distribution,
        total_defects,
    })
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    total_inspections: i64,
    total_defects: i64,
    total_machines: i64,
    date_start: Option<NaiveDateTime>,
    date_end: Option<NaiveDateTime>,
}

/// Headline metrics over the filtered inspection set
#[derive(Debug, Clone, Serialize)]
pub struct SummaryMetrics {
    pub total_inspections: i64,
    pub total_defects: i64,
    pub defect_rate: f64,
    pub total_machines: i64,
    pub date_start: Option<NaiveDateTime>,
    pub date_end: Option<NaiveDateTime>,
}

/// Totals, machine count, observed timestamp range and overall defect rate.
pub async fn summary_metrics(
    pool: &SqlitePool,
    filter: &AnalyticsFilter,
) -> Result<SummaryMetrics> {
    let sql = format!(
        "SELECT COUNT(i.id) AS total_inspections,
                COALESCE(SUM({defects}), 0) AS total_defects,
                COUNT(DISTINCT i.molding_machine_id) AS total_machines,
                MIN(i.timestamp) AS date_start,
                MAX(i.timestamp) AS date_end
         FROM product_inspections i{clause}",
        defects = DEFECT_COUNT_SUBQUERY,
        clause = filter.clause(),
    );

    let row: SummaryRow = bind_filter!(sqlx::query_as(&sql), filter)
        .fetch_one(pool)
        .await?;

    Ok(SummaryMetrics {
        defect_rate: rate(row.total_defects, row.total_inspections),
        total_inspections: row.total_inspections,
        total_defects: row.total_defects,
        total_machines: row.total_machines,
        date_start: row.date_start,
        date_end: row.date_end,
    })
}
