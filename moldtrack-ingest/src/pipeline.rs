//! Ingestion pipeline
//!
//! Normalize, validate, then write the full entity graph in one
//! transaction. Either the inspection and every descendant commit together
//! or nothing does; readers never see a partial graph.

use crate::normalize::normalize_record;
use crate::validate::{validate_record, InspectionRecord};
use moldtrack_common::db::models::{
    DefectDetail, DetectionDetail, InspectionDetail, MachineState, PixelSeverity,
};
use moldtrack_common::{Error, Result};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

/// Ingest one raw record. Returns the fully populated aggregate with its
/// generated identifiers.
pub async fn ingest_one(pool: &SqlitePool, raw: &Value) -> Result<InspectionDetail> {
    let normalized = normalize_record(raw)?;
    let record = validate_record(&normalized)?;

    let mut tx = pool.begin().await?;
    // Dropping the transaction on any error path rolls everything back
    let detail = insert_record(&mut tx, record).await?;
    tx.commit().await?;
    Ok(detail)
}

/// Ingest a batch sequentially, one transaction per record.
///
/// Default policy: abort on the first failing record. Records committed
/// before the failure stay persisted; the error names the failing record's
/// index. See [`ingest_batch_lenient`] for the continue-on-error policy.
pub async fn ingest_batch(pool: &SqlitePool, records: &[Value]) -> Result<Vec<InspectionDetail>> {
    let mut saved = Vec::with_capacity(records.len());
    for (index, raw) in records.iter().enumerate() {
        match ingest_one(pool, raw).await {
            Ok(detail) => saved.push(detail),
            Err(err) => return Err(err.at_record(index)),
        }
    }
    info!("Ingested {} records", saved.len());
    Ok(saved)
}

/// Result of a lenient batch run: what persisted and what failed
#[derive(Debug)]
pub struct BatchOutcome {
    pub saved: Vec<InspectionDetail>,
    pub failures: Vec<(usize, Error)>,
}

/// Alternative batch policy: keep going on per-record failures and report
/// them all at the end. Each record remains individually atomic.
pub async fn ingest_batch_lenient(pool: &SqlitePool, records: &[Value]) -> BatchOutcome {
    let mut saved = Vec::new();
    let mut failures = Vec::new();
    for (index, raw) in records.iter().enumerate() {
        match ingest_one(pool, raw).await {
            Ok(detail) => saved.push(detail),
            Err(err) => {
                warn!("Record {} failed: {}", index, err);
                failures.push((index, err));
            }
        }
    }
    info!(
        "Ingested {} records, {} failed",
        saved.len(),
        failures.len()
    );
    BatchOutcome { saved, failures }
}

/// Write the validated record's entity graph inside the caller's
/// transaction, collecting generated ids into the returned aggregate.
async fn insert_record(
    tx: &mut Transaction<'_, Sqlite>,
    record: InspectionRecord,
) -> Result<InspectionDetail> {
    let inspection_id: i64 = sqlx::query_scalar(
        "INSERT INTO product_inspections (version, timestamp, molding_machine_id)
         VALUES (?, ?, ?) RETURNING id",
    )
    .bind(&record.version)
    .bind(record.timestamp)
    .bind(&record.molding_machine_id)
    .fetch_one(&mut **tx)
    .await?;

    let state = record.machine_state;
    let extra = if state.extra.is_empty() {
        None
    } else {
        Some(Json(state.extra.clone()))
    };
    let state_id: i64 = sqlx::query_scalar(
        "INSERT INTO machine_states
         (inspection_id, cycle_time, inj_peak_pressure,
          barrel1, barrel2, barrel3, barrel4, barrel5, barrel6, extra)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(inspection_id)
    .bind(state.cycle_time)
    .bind(state.inj_peak_pressure)
    .bind(state.barrels[0])
    .bind(state.barrels[1])
    .bind(state.barrels[2])
    .bind(state.barrels[3])
    .bind(state.barrels[4])
    .bind(state.barrels[5])
    .bind(extra.clone())
    .fetch_one(&mut **tx)
    .await?;

    let machine_state = MachineState {
        id: state_id,
        inspection_id,
        cycle_time: state.cycle_time,
        inj_peak_pressure: state.inj_peak_pressure,
        barrel1: state.barrels[0],
        barrel2: state.barrels[1],
        barrel3: state.barrels[2],
        barrel4: state.barrels[3],
        barrel5: state.barrels[4],
        barrel6: state.barrels[5],
        extra,
    };

    let mut object_detections = Vec::with_capacity(record.detections.len());
    for (name, detection) in record.detections {
        let detection_id: i64 = sqlx::query_scalar(
            "INSERT INTO object_detections (inspection_id, name, reject)
             VALUES (?, ?, ?) RETURNING id",
        )
        .bind(inspection_id)
        .bind(&name)
        .bind(detection.reject)
        .fetch_one(&mut **tx)
        .await?;

        let mut defects = Vec::with_capacity(detection.defects.len());
        for (defect_type, defect) in detection.defects {
            let defect_id: i64 = sqlx::query_scalar(
                "INSERT INTO defects (object_detection_id, defect_type, reject)
                 VALUES (?, ?, ?) RETURNING id",
            )
            .bind(detection_id)
            .bind(&defect_type)
            .bind(defect.reject)
            .fetch_one(&mut **tx)
            .await?;

            let severity = defect.severity;
            let severity_id: i64 = sqlx::query_scalar(
                "INSERT INTO pixel_severities
                 (defect_id, reject, value, min_value, max_value, threshold)
                 VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(defect_id)
            .bind(severity.reject)
            .bind(severity.value)
            .bind(severity.min_value)
            .bind(severity.max_value)
            .bind(severity.threshold)
            .fetch_one(&mut **tx)
            .await?;

            defects.push(DefectDetail {
                id: defect_id,
                defect_type,
                reject: defect.reject,
                pixel_severity: PixelSeverity {
                    id: severity_id,
                    reject: severity.reject,
                    value: severity.value,
                    min_value: Some(severity.min_value),
                    max_value: Some(severity.max_value),
                    threshold: Some(severity.threshold),
                },
            });
        }

        object_detections.push(DetectionDetail {
            id: detection_id,
            name,
            reject: detection.reject,
            defects,
        });
    }

    Ok(InspectionDetail {
        id: inspection_id,
        version: record.version,
        timestamp: record.timestamp,
        molding_machine_id: record.molding_machine_id,
        machine_state: Some(machine_state),
        object_detections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use moldtrack_common::db::init::create_tables;
    use moldtrack_common::db::inspections::{get_inspection, list_inspections, InspectionFilter};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_tables(&pool).await.unwrap();
        pool
    }

    fn sample_record() -> Value {
        json!({
            "timestamp": 1700000000,
            "molding-machine-id": "M1",
            "version": "1.0",
            "object_detection": {
                "reject": true,
                "flash_defect": {
                    "reject": true,
                    "pixel_severity": {
                        "value": 5.0, "reject": true,
                        "min_value": 0.0, "max_value": 10.0, "threshold": 4.0
                    }
                }
            }
        })
    }

    async fn table_counts(pool: &SqlitePool) -> (i64, i64, i64, i64, i64) {
        let inspections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_inspections")
            .fetch_one(pool)
            .await
            .unwrap();
        let states: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM machine_states")
            .fetch_one(pool)
            .await
            .unwrap();
        let detections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM object_detections")
            .fetch_one(pool)
            .await
            .unwrap();
        let defects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM defects")
            .fetch_one(pool)
            .await
            .unwrap();
        let severities: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pixel_severities")
            .fetch_one(pool)
            .await
            .unwrap();
        (inspections, states, detections, defects, severities)
    }

    #[tokio::test]
    async fn ingests_the_full_entity_graph() {
        let pool = setup_pool().await;
        let detail = ingest_one(&pool, &sample_record()).await.unwrap();

        assert_eq!(detail.molding_machine_id, "M1");
        assert_eq!(detail.version, "1.0");
        assert_eq!(detail.object_detections.len(), 1);

        let detection = &detail.object_detections[0];
        assert_eq!(detection.name, "default");
        assert!(detection.reject);
        assert_eq!(detection.defects.len(), 1);
        assert_eq!(detection.defects[0].defect_type, "flash_defect");
        assert_eq!(detection.defects[0].pixel_severity.value, 5.0);

        assert_eq!(table_counts(&pool).await, (1, 1, 1, 1, 1));

        // Aggregate ids round-trip through the read path
        let fetched = get_inspection(&pool, detail.id).await.unwrap().unwrap();
        assert_eq!(fetched.object_detections[0].id, detection.id);
        assert_eq!(
            fetched.object_detections[0].defects[0].pixel_severity.value,
            5.0
        );
    }

    #[tokio::test]
    async fn detection_and_defect_counts_match_the_record() {
        let pool = setup_pool().await;
        let raw = json!({
            "timestamp": "2024-01-15T10:00:00",
            "molding_machine_id": "M7",
            "version": "1.1",
            "object_detections": {
                "cavity_a": {
                    "reject": true,
                    "flash_defect": {
                        "reject": true,
                        "pixel_severity": {
                            "value": 5.0, "reject": true,
                            "min_value": 0.0, "max_value": 10.0, "threshold": 4.0
                        }
                    },
                    "splay_defect": {
                        "reject": false,
                        "pixel_severity": {
                            "value": 1.0, "reject": false,
                            "min_value": 0.0, "max_value": 10.0, "threshold": 4.0
                        }
                    }
                },
                "cavity_b": {"reject": false}
            }
        });

        let detail = ingest_one(&pool, &raw).await.unwrap();
        assert_eq!(detail.object_detections.len(), 2);
        assert_eq!(table_counts(&pool).await, (1, 1, 2, 2, 2));
    }

    #[tokio::test]
    async fn invalid_record_leaves_store_unchanged() {
        let pool = setup_pool().await;
        // Missing molding_machine_id
        let raw = json!({"timestamp": 1700000000, "version": "1.0"});

        let err = ingest_one(&pool, &raw).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(table_counts(&pool).await, (0, 0, 0, 0, 0));
    }

    #[tokio::test]
    async fn record_without_telemetry_still_gets_a_state_row() {
        let pool = setup_pool().await;
        let raw = json!({
            "timestamp": 1700000000,
            "molding_machine_id": "M1",
            "version": "1.0"
        });

        let detail = ingest_one(&pool, &raw).await.unwrap();
        let state = detail.machine_state.unwrap();
        assert!(state.cycle_time.is_none());
        assert!(state.extra.is_none());
        assert!(detail.object_detections.is_empty());
        assert_eq!(table_counts(&pool).await, (1, 1, 0, 0, 0));
    }

    #[tokio::test]
    async fn unknown_telemetry_round_trips_through_extra() {
        let pool = setup_pool().await;
        let raw = json!({
            "timestamp": 1700000000,
            "molding_machine_id": "M1",
            "version": "1.0",
            "molding_machine_state": {"CycleTime": 12.0, "mold_open_time": 3.2}
        });

        let detail = ingest_one(&pool, &raw).await.unwrap();
        let fetched = get_inspection(&pool, detail.id).await.unwrap().unwrap();
        let state = fetched.machine_state.unwrap();
        assert_eq!(state.cycle_time, Some(12.0));
        let extra = state.extra.unwrap();
        assert_eq!(extra["mold_open_time"], json!(3.2));
    }

    #[tokio::test]
    async fn batch_aborts_on_first_failure_keeping_prior_records() {
        let pool = setup_pool().await;
        let records = vec![
            sample_record(),
            json!({"timestamp": "not a time", "molding_machine_id": "M1", "version": "1.0"}),
            sample_record(),
        ];

        let err = ingest_batch(&pool, &records).await.unwrap_err();
        let Error::Batch { index, source } = err else {
            panic!("expected batch error");
        };
        assert_eq!(index, 1);
        assert!(matches!(*source, Error::Normalization(_)));

        // First record persisted, third never attempted
        let (details, total) =
            list_inspections(&pool, &InspectionFilter::default(), 1, 50).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(details[0].molding_machine_id, "M1");
    }

    #[tokio::test]
    async fn lenient_batch_collects_failures() {
        let pool = setup_pool().await;
        let records = vec![
            sample_record(),
            json!({"version": "1.0"}),
            sample_record(),
        ];

        let outcome = ingest_batch_lenient(&pool, &records).await;
        assert_eq!(outcome.saved.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, 1);

        let (_, total) =
            list_inspections(&pool, &InspectionFilter::default(), 1, 50).await.unwrap();
        assert_eq!(total, 2);
    }
}
