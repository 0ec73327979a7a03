//! Strict validation of canonical records
//!
//! Turns the normalizer's canonical map into a fully typed
//! [`InspectionRecord`], or fails with one `Error::Validation` listing
//! every structural problem found. Defect-type keys are an open
//! vocabulary: any `*_defect` key with a non-null value must validate as a
//! defect record; other unrecognized keys are ignored.

use crate::normalize::TIMESTAMP_FORMAT;
use chrono::NaiveDateTime;
use moldtrack_common::{Error, Result};
use serde_json::{Map, Value};

/// Fully validated inspection record, ready for persistence
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionRecord {
    pub version: String,
    pub timestamp: NaiveDateTime,
    pub molding_machine_id: String,
    pub machine_state: MachineStateRecord,
    pub detections: Vec<(String, DetectionRecord)>,
}

/// Best-effort telemetry; every field optional
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MachineStateRecord {
    pub cycle_time: Option<f64>,
    pub inj_peak_pressure: Option<f64>,
    pub barrels: [Option<f64>; 6],
    /// Machine-reported fields outside the recognized telemetry set
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    pub reject: bool,
    pub defects: Vec<(String, DefectRecord)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefectRecord {
    pub reject: bool,
    pub severity: SeverityRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeverityRecord {
    pub reject: bool,
    pub value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub threshold: f64,
}

/// Recognized telemetry keys: canonical column name plus the spelling the
/// machines report
const TELEMETRY_KEYS: &[(&str, &str)] = &[
    ("cycle_time", "CycleTime"),
    ("inj_peak_pressure", "InjPeakPressure"),
    ("barrel1", "Barrel1"),
    ("barrel2", "Barrel2"),
    ("barrel3", "Barrel3"),
    ("barrel4", "Barrel4"),
    ("barrel5", "Barrel5"),
    ("barrel6", "Barrel6"),
];

/// Validate one canonical record, collecting every problem before failing
pub fn validate_record(data: &Map<String, Value>) -> Result<InspectionRecord> {
    let mut problems = Vec::new();

    let version = require_string(data, "version", &mut problems);
    let molding_machine_id = require_string(data, "molding_machine_id", &mut problems);
    let timestamp = require_timestamp(data, &mut problems);
    let machine_state = validate_machine_state(data.get("molding_machine_state"), &mut problems);
    let detections = validate_detections(data.get("object_detections"), &mut problems);

    match (version, timestamp, molding_machine_id) {
        (Some(version), Some(timestamp), Some(molding_machine_id)) if problems.is_empty() => {
            Ok(InspectionRecord {
                version,
                timestamp,
                molding_machine_id,
                machine_state,
                detections,
            })
        }
        _ => Err(Error::Validation(problems)),
    }
}

fn require_string(
    data: &Map<String, Value>,
    field: &str,
    problems: &mut Vec<String>,
) -> Option<String> {
    match data.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            problems.push(format!("{}: expected string", field));
            None
        }
        None => {
            problems.push(format!("missing required field: {}", field));
            None
        }
    }
}

fn require_timestamp(data: &Map<String, Value>, problems: &mut Vec<String>) -> Option<NaiveDateTime> {
    match data.get("timestamp") {
        Some(Value::String(s)) => match NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
            Ok(dt) => Some(dt),
            Err(_) => {
                problems.push(format!("timestamp: not a canonical datetime: {}", s));
                None
            }
        },
        Some(_) => {
            problems.push("timestamp: expected string".to_string());
            None
        }
        None => {
            problems.push("missing required field: timestamp".to_string());
            None
        }
    }
}

fn validate_machine_state(
    value: Option<&Value>,
    problems: &mut Vec<String>,
) -> MachineStateRecord {
    let Some(value) = value else {
        problems.push("missing required field: molding_machine_state".to_string());
        return MachineStateRecord::default();
    };
    let Some(obj) = value.as_object() else {
        problems.push("molding_machine_state: expected object".to_string());
        return MachineStateRecord::default();
    };

    let mut state = MachineStateRecord::default();
    let mut claimed: Vec<&str> = Vec::new();

    for (index, (canonical, reported)) in TELEMETRY_KEYS.iter().enumerate() {
        let found = obj
            .get(*canonical)
            .map(|v| (*canonical, v))
            .or_else(|| obj.get(*reported).map(|v| (*reported, v)));
        let Some((key, value)) = found else {
            continue;
        };
        claimed.push(key);
        if value.is_null() {
            continue;
        }
        let Some(number) = value.as_f64() else {
            problems.push(format!("molding_machine_state.{}: expected number", key));
            continue;
        };
        match index {
            0 => state.cycle_time = Some(number),
            1 => state.inj_peak_pressure = Some(number),
            n => state.barrels[n - 2] = Some(number),
        }
    }

    for (key, value) in obj {
        if !claimed.contains(&key.as_str()) {
            state.extra.insert(key.clone(), value.clone());
        }
    }

    state
}

fn validate_detections(
    value: Option<&Value>,
    problems: &mut Vec<String>,
) -> Vec<(String, DetectionRecord)> {
    let Some(obj) = value.and_then(|v| v.as_object()) else {
        problems.push("object_detections: expected object".to_string());
        return Vec::new();
    };

    let mut detections = Vec::new();
    for (name, entry) in obj {
        let path = format!("object_detections.{}", name);
        let Some(entry) = entry.as_object() else {
            problems.push(format!("{}: expected object", path));
            continue;
        };

        let reject = require_bool(entry, "reject", &path, problems);

        if let Some(label) = entry.get("label_detection") {
            if !label.is_object() {
                problems.push(format!("{}.label_detection: expected object", path));
            }
        }

        let mut defects = Vec::new();
        for (key, value) in entry {
            if !key.ends_with("_defect") || value.is_null() {
                continue;
            }
            let defect_path = format!("{}.{}", path, key);
            if let Some(defect) = validate_defect(value, &defect_path, problems) {
                defects.push((key.clone(), defect));
            }
        }

        if let Some(reject) = reject {
            detections.push((name.clone(), DetectionRecord { reject, defects }));
        }
    }

    detections
}

fn validate_defect(
    value: &Value,
    path: &str,
    problems: &mut Vec<String>,
) -> Option<DefectRecord> {
    let Some(obj) = value.as_object() else {
        problems.push(format!("{}: expected object", path));
        return None;
    };

    let reject = require_bool(obj, "reject", path, problems);
    let severity = match obj.get("pixel_severity") {
        Some(value) => validate_severity(value, &format!("{}.pixel_severity", path), problems),
        None => {
            problems.push(format!("{}: missing required field: pixel_severity", path));
            None
        }
    };

    match (reject, severity) {
        (Some(reject), Some(severity)) => Some(DefectRecord { reject, severity }),
        _ => None,
    }
}

fn validate_severity(
    value: &Value,
    path: &str,
    problems: &mut Vec<String>,
) -> Option<SeverityRecord> {
    let Some(obj) = value.as_object() else {
        problems.push(format!("{}: expected object", path));
        return None;
    };

    let reject = require_bool(obj, "reject", path, problems);
    let value_ = require_number(obj, "value", path, problems);
    let min_value = require_number(obj, "min_value", path, problems);
    let max_value = require_number(obj, "max_value", path, problems);
    let threshold = require_number(obj, "threshold", path, problems);

    match (reject, value_, min_value, max_value, threshold) {
        (Some(reject), Some(value), Some(min_value), Some(max_value), Some(threshold)) => {
            Some(SeverityRecord {
                reject,
                value,
                min_value,
                max_value,
                threshold,
            })
        }
        _ => None,
    }
}

fn require_bool(
    obj: &Map<String, Value>,
    field: &str,
    path: &str,
    problems: &mut Vec<String>,
) -> Option<bool> {
    match obj.get(field) {
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => {
            problems.push(format!("{}.{}: expected boolean", path, field));
            None
        }
        None => {
            problems.push(format!("{}: missing required field: {}", path, field));
            None
        }
    }
}

fn require_number(
    obj: &Map<String, Value>,
    field: &str,
    path: &str,
    problems: &mut Vec<String>,
) -> Option<f64> {
    match obj.get(field).and_then(|v| v.as_f64()) {
        Some(n) => Some(n),
        None => {
            problems.push(format!("{}.{}: expected number", path, field));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_record;
    use serde_json::json;

    fn canonical(raw: Value) -> Map<String, Value> {
        normalize_record(&raw).unwrap()
    }

    fn valid_raw() -> Value {
        json!({
            "version": "1.0",
            "timestamp": "2024-01-15T10:30:00",
            "molding-machine-id": "M1",
            "molding_machine_state": {
                "CycleTime": 12.5,
                "InjPeakPressure": 901.0,
                "Barrel1": 200.0,
                "mold_open_time": 3.2
            },
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

    #[test]
    fn accepts_a_complete_record() {
        let record = validate_record(&canonical(valid_raw())).unwrap();
        assert_eq!(record.version, "1.0");
        assert_eq!(record.molding_machine_id, "M1");
        assert_eq!(record.machine_state.cycle_time, Some(12.5));
        assert_eq!(record.machine_state.inj_peak_pressure, Some(901.0));
        assert_eq!(record.machine_state.barrels[0], Some(200.0));
        // Unrecognized telemetry lands in extra, untouched
        assert_eq!(record.machine_state.extra["mold_open_time"], json!(3.2));

        assert_eq!(record.detections.len(), 1);
        let (name, detection) = &record.detections[0];
        assert_eq!(name, "default");
        assert!(detection.reject);
        assert_eq!(detection.defects.len(), 1);
        let (defect_type, defect) = &detection.defects[0];
        assert_eq!(defect_type, "flash_defect");
        assert_eq!(defect.severity.value, 5.0);
        assert_eq!(defect.severity.threshold, 4.0);
    }

    #[test]
    fn collects_every_problem_at_once() {
        let data = canonical(json!({
            "version": 1,
            "object_detection": {
                "reject": "yes",
                "splay_defect": {
                    "reject": true,
                    "pixel_severity": {"value": "high", "reject": true}
                }
            }
        }));
        let err = validate_record(&data).unwrap_err();
        let Error::Validation(problems) = err else {
            panic!("expected validation error");
        };
        assert!(problems.iter().any(|p| p == "version: expected string"));
        assert!(problems
            .iter()
            .any(|p| p == "missing required field: timestamp"));
        assert!(problems
            .iter()
            .any(|p| p == "missing required field: molding_machine_id"));
        assert!(problems
            .iter()
            .any(|p| p == "object_detections.default.reject: expected boolean"));
        assert!(problems
            .iter()
            .any(|p| p == "object_detections.default.splay_defect.pixel_severity.value: expected number"));
        assert!(problems
            .iter()
            .any(|p| p.contains("pixel_severity.min_value")));
    }

    #[test]
    fn missing_required_fields_fail() {
        let data = canonical(json!({"timestamp": 1700000000}));
        let err = validate_record(&data).unwrap_err();
        let Error::Validation(problems) = err else {
            panic!("expected validation error");
        };
        assert!(problems.contains(&"missing required field: version".to_string()));
        assert!(problems.contains(&"missing required field: molding_machine_id".to_string()));
    }

    #[test]
    fn null_defect_fields_are_skipped() {
        let data = canonical(json!({
            "version": "1.0",
            "timestamp": 1700000000,
            "molding_machine_id": "M1",
            "object_detection": {"reject": false, "flash_defect": null}
        }));
        let record = validate_record(&data).unwrap();
        assert!(record.detections[0].1.defects.is_empty());
    }

    #[test]
    fn non_defect_extra_keys_are_ignored() {
        let data = canonical(json!({
            "version": "1.0",
            "timestamp": 1700000000,
            "molding_machine_id": "M1",
            "object_detection": {
                "reject": false,
                "camera_id": "cam-3",
                "label_detection": {"label": "ok"}
            }
        }));
        let record = validate_record(&data).unwrap();
        assert!(record.detections[0].1.defects.is_empty());
    }

    #[test]
    fn open_vocabulary_accepts_new_defect_types() {
        let data = canonical(json!({
            "version": "1.0",
            "timestamp": 1700000000,
            "molding_machine_id": "M1",
            "object_detection": {
                "reject": true,
                "burn_mark_defect": {
                    "reject": true,
                    "pixel_severity": {
                        "value": 2.0, "reject": true,
                        "min_value": 0.0, "max_value": 10.0, "threshold": 1.5
                    }
                }
            }
        }));
        let record = validate_record(&data).unwrap();
        assert_eq!(record.detections[0].1.defects[0].0, "burn_mark_defect");
    }

    #[test]
    fn malformed_defect_record_is_an_error_not_ignored() {
        let data = canonical(json!({
            "version": "1.0",
            "timestamp": 1700000000,
            "molding_machine_id": "M1",
            "object_detection": {
                "reject": true,
                "flash_defect": {"reject": true}
            }
        }));
        let err = validate_record(&data).unwrap_err();
        assert!(err
            .to_string()
            .contains("missing required field: pixel_severity"));
    }

    #[test]
    fn telemetry_must_be_numeric_when_present() {
        let data = canonical(json!({
            "version": "1.0",
            "timestamp": 1700000000,
            "molding_machine_id": "M1",
            "molding_machine_state": {"CycleTime": "fast"}
        }));
        let err = validate_record(&data).unwrap_err();
        assert!(err
            .to_string()
            .contains("molding_machine_state.CycleTime: expected number"));
    }
}
