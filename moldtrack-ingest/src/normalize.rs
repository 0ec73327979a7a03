//! Record normalization
//!
//! The dataset mixes hyphenated and underscored key spellings, three
//! timestamp encodings, optional telemetry, and two detection layouts
//! (a named `object_detections` map or a single bare `object_detection`).
//! Normalization maps all of that onto one canonical shape; it never
//! decides whether a record is valid beyond "can this be mapped at all".

use chrono::{DateTime, Local, NaiveDateTime};
use moldtrack_common::{Error, Result};
use serde_json::{Map, Value};

/// Canonical timestamp encoding used between normalizer and validator
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Normalize one raw record into the canonical key/value shape.
///
/// Rules, applied in order:
/// 1. top-level keys are de-hyphenated (`molding-machine-id` ->
///    `molding_machine_id`)
/// 2. `timestamp` is coerced to a canonical ISO-8601 string
/// 3. a missing `molding_machine_state` becomes an empty object
/// 4. detection groups are collected under `object_detections`, wrapping a
///    singular `object_detection` under the name `"default"`
pub fn normalize_record(raw: &Value) -> Result<Map<String, Value>> {
    let obj = raw
        .as_object()
        .ok_or_else(|| Error::Normalization("record is not a JSON object".to_string()))?;

    let mut data = Map::new();
    for (key, value) in obj {
        data.insert(key.replace('-', "_"), value.clone());
    }

    if let Some(ts) = data.get("timestamp") {
        let parsed = parse_timestamp(ts)?;
        data.insert(
            "timestamp".to_string(),
            Value::String(parsed.format(TIMESTAMP_FORMAT).to_string()),
        );
    }

    if !data.contains_key("molding_machine_state") {
        data.insert(
            "molding_machine_state".to_string(),
            Value::Object(Map::new()),
        );
    }

    let detections = normalize_detections(&data)?;
    data.remove("object_detection");
    data.insert("object_detections".to_string(), Value::Object(detections));

    Ok(data)
}

/// Coerce a raw timestamp value to a local naive datetime.
///
/// Accepted shapes: numeric epoch seconds (fractional ok), extended
/// ISO-8601 string, or a numeric string treated as epoch seconds.
pub fn parse_timestamp(value: &Value) -> Result<NaiveDateTime> {
    match value {
        Value::Number(n) => {
            let secs = n
                .as_f64()
                .ok_or_else(|| unrecognized_timestamp(value))?;
            epoch_to_local(secs).ok_or_else(|| unrecognized_timestamp(value))
        }
        Value::String(s) => {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
                return Ok(dt);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Local).naive_local());
            }
            if let Ok(secs) = s.parse::<f64>() {
                return epoch_to_local(secs).ok_or_else(|| unrecognized_timestamp(value));
            }
            Err(unrecognized_timestamp(value))
        }
        _ => Err(unrecognized_timestamp(value)),
    }
}

fn unrecognized_timestamp(value: &Value) -> Error {
    Error::Normalization(format!("unrecognized timestamp: {}", value))
}

/// Epoch seconds to local naive datetime, matching how the production line
/// records wall-clock time
fn epoch_to_local(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    let utc = DateTime::from_timestamp(whole as i64, nanos)?;
    Some(utc.with_timezone(&Local).naive_local())
}

/// Build the canonical detection-group mapping
fn normalize_detections(data: &Map<String, Value>) -> Result<Map<String, Value>> {
    let source = if let Some(plural) = data.get("object_detections") {
        plural
            .as_object()
            .cloned()
            .ok_or_else(|| {
                Error::Normalization("object_detections is not an object".to_string())
            })?
    } else if let Some(singular) = data.get("object_detection") {
        let mut wrapped = Map::new();
        wrapped.insert("default".to_string(), singular.clone());
        wrapped
    } else {
        return Ok(Map::new());
    };

    let mut normalized = Map::new();
    for (name, entry) in source {
        // Non-object entries cannot describe a detection; drop them
        let Some(entry) = entry.as_object() else {
            continue;
        };

        let mut item = Map::new();
        item.insert(
            "reject".to_string(),
            entry.get("reject").cloned().unwrap_or(Value::Bool(false)),
        );
        let label = match entry.get("label_detection") {
            Some(v) if !is_falsy(v) => v.clone(),
            _ => Value::Object(Map::new()),
        };
        item.insert("label_detection".to_string(), label);

        // Everything else is carried through untouched; this is what lets
        // new defect-type keys flow to the validator without changes here
        for (key, value) in entry {
            if key != "reject" && key != "label_detection" {
                item.insert(key.clone(), value.clone());
            }
        }

        normalized.insert(name, Value::Object(item));
    }

    Ok(normalized)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
