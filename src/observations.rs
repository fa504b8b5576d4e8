use serde_json::Value;

use crate::model::{Field, SampleSummary, StrengthSeries};

/// Canonical per-specimen measurement record. After normalization the list
/// always holds exactly `SampleSummary::cube_count()` entries, so every
/// downstream table can size itself without re-checking.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeObservation {
    /// 1-based serial as printed in the Sr. No. column.
    pub serial: u32,
    pub id_mark: Field<String>,
    pub length: Field<f64>,
    pub width: Field<f64>,
    pub height: Field<f64>,
    pub weight: Field<f64>,
    pub crushing_load: Field<f64>,
    pub compressive_strength: Field<f64>,
    pub failure_type: Field<String>,
    pub area: Field<f64>,
    pub density: Field<f64>,
}

impl CubeObservation {
    fn pending(serial: u32) -> Self {
        Self {
            serial,
            id_mark: Field::Unavailable,
            length: Field::Pending,
            width: Field::Pending,
            height: Field::Pending,
            weight: Field::Pending,
            crushing_load: Field::Pending,
            compressive_strength: Field::Pending,
            failure_type: Field::Pending,
            area: Field::Pending,
            density: Field::Pending,
        }
    }

    /// Printed specimen mark; serial-based fallback when the record never
    /// carried one.
    pub fn display_mark(&self) -> String {
        match self.id_mark.measured() {
            Some(mark) if !mark.trim().is_empty() => mark.clone(),
            _ => format!("Cube {}", self.serial),
        }
    }
}

/// The two historical persisted encodings, classified structurally before
/// any field is read. This is a schema-versioning seam, not a formatting
/// convenience: every consumer goes through [`normalize`].
#[derive(Debug)]
enum RawObservations {
    /// "New" encoding: a flat ordered list of per-cube objects.
    Flat(Vec<Value>),
    /// "Old" encoding: an object wrapping a nested cube list, optionally
    /// carrying a strength_data block alongside.
    Nested {
        cubes: Vec<Value>,
        strength: Option<Value>,
    },
    Absent,
}

fn classify(raw: Option<&str>) -> RawObservations {
    let Some(raw) = raw else {
        return RawObservations::Absent;
    };
    if raw.trim().is_empty() {
        return RawObservations::Absent;
    }
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("malformed observations blob, degrading to empty list: {err}");
            return RawObservations::Absent;
        }
    };
    match value {
        Value::Array(items) => RawObservations::Flat(items),
        Value::Object(mut map) => {
            let cubes = map
                .remove("cube_measurements")
                .or_else(|| map.remove("cube_data"))
                .and_then(|nested| match nested {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .unwrap_or_default();
            let strength = map.remove("strength_data");
            RawObservations::Nested { cubes, strength }
        }
        Value::Null => RawObservations::Absent,
        other => {
            log::warn!(
                "observations blob has unexpected shape ({}), degrading to empty list",
                type_name(&other)
            );
            RawObservations::Absent
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// True when an entry describes a cube rather than an embedded wrapper
/// object (strength blocks ride along in legacy flat lists).
fn is_cube_entry(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    map.contains_key("cube_id")
        || map.contains_key("id_mark")
        || map.contains_key("dimension_length")
        || map.contains_key("dimension_height")
}

/// Normalizes the raw blob plus the summary's legacy fallback fields into
/// the canonical cube list and the strength series for the chart. Never
/// fails; every malformed input degrades to sentinel entries.
pub fn normalize(sample: &SampleSummary, raw: Option<&str>) -> (Vec<CubeObservation>, StrengthSeries) {
    let mut series = StrengthSeries::default();
    let mut entries: Vec<CubeObservation> = Vec::new();

    match classify(raw) {
        RawObservations::Flat(items) => {
            for item in &items {
                if let Some(strength) = item.get("strength_data") {
                    merge_series(&mut series, strength);
                }
            }
            for (index, item) in items.iter().filter(|item| is_cube_entry(item)).enumerate() {
                entries.push(cube_from_value(index as u32 + 1, item));
            }
        }
        RawObservations::Nested { cubes, strength } => {
            if let Some(strength) = strength {
                merge_series(&mut series, &strength);
            }
            for (index, item) in cubes.iter().filter(|item| is_cube_entry(item)).enumerate() {
                entries.push(cube_from_value(index as u32 + 1, item));
            }
            if entries.is_empty() && sample.has_legacy_observation() {
                entries.push(cube_from_legacy(sample));
            }
        }
        RawObservations::Absent => {
            if sample.has_legacy_observation() {
                entries.push(cube_from_legacy(sample));
            }
        }
    }

    // Invariant: exactly cube_count entries, short input padded with the
    // pending sentinel, long input truncated.
    let count = sample.cube_count();
    entries.truncate(count);
    while entries.len() < count {
        entries.push(CubeObservation::pending(entries.len() as u32 + 1));
    }
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.serial = index as u32 + 1;
    }

    (entries, series)
}

fn cube_from_value(serial: u32, value: &Value) -> CubeObservation {
    CubeObservation {
        serial,
        id_mark: text_field(value, &["cube_id", "id_mark"]),
        length: numeric_field(value, "dimension_length"),
        width: numeric_field(value, "dimension_width"),
        height: numeric_field(value, "dimension_height"),
        weight: numeric_field(value, "weight"),
        crushing_load: numeric_field(value, "crushing_load"),
        compressive_strength: numeric_field(value, "compressive_strength"),
        failure_type: text_field(value, &["failure_type"]),
        area: numeric_field(value, "area"),
        density: numeric_field(value, "density"),
    }
}

/// Reconstructs a single entry from the summary's flat per-field columns,
/// the shape old records used before per-cube lists existed.
fn cube_from_legacy(sample: &SampleSummary) -> CubeObservation {
    CubeObservation {
        serial: 1,
        id_mark: match sample.id_mark.as_deref() {
            Some(mark) if !mark.trim().is_empty() => Field::Measured(mark.to_string()),
            _ => Field::Unavailable,
        },
        length: opt_numeric(sample.dimension_length),
        width: opt_numeric(sample.dimension_width),
        height: opt_numeric(sample.dimension_height),
        weight: opt_numeric(sample.weight),
        crushing_load: opt_numeric(sample.crushing_load),
        compressive_strength: opt_numeric(sample.compressive_strength),
        failure_type: match sample.failure_type.as_deref() {
            Some(kind) if !kind.trim().is_empty() => Field::Measured(kind.to_string()),
            _ => Field::Unavailable,
        },
        area: Field::Unavailable,
        density: Field::Unavailable,
    }
}

fn opt_numeric(value: Option<f64>) -> Field<f64> {
    match value {
        Some(value) if value.is_finite() => Field::Measured(value),
        _ => Field::Unavailable,
    }
}

/// Reads a numeric field that legacy blobs may store as a number, a
/// numeric string, the pending sentinel, or not at all.
fn numeric_field(value: &Value, key: &str) -> Field<f64> {
    match value.get(key) {
        None | Some(Value::Null) => Field::Unavailable,
        Some(Value::Number(number)) => match number.as_f64() {
            Some(number) if number.is_finite() => Field::Measured(number),
            _ => Field::Unavailable,
        },
        Some(Value::String(text)) => {
            let text = text.trim();
            if text.is_empty() {
                Field::Unavailable
            } else if let Ok(number) = text.parse::<f64>() {
                Field::Measured(number)
            } else {
                // Any non-numeric string marks a not-yet-measured cell.
                Field::Pending
            }
        }
        Some(_) => Field::Unavailable,
    }
}

fn text_field(value: &Value, keys: &[&str]) -> Field<String> {
    for key in keys {
        match value.get(key) {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                return Field::Measured(text.trim().to_string());
            }
            Some(Value::Number(number)) => {
                return Field::Measured(number.to_string());
            }
            _ => continue,
        }
    }
    Field::Unavailable
}

fn merge_series(series: &mut StrengthSeries, value: &Value) {
    series.required_7 = series.required_7.or_else(|| series_value(value, "required_7"));
    series.required_14 = series.required_14.or_else(|| series_value(value, "required_14"));
    series.required_28 = series.required_28.or_else(|| series_value(value, "required_28"));
    series.actual_7 = series.actual_7.or_else(|| series_value(value, "actual_7"));
    series.actual_14 = series.actual_14.or_else(|| series_value(value, "actual_14"));
    series.actual_28 = series.actual_28.or_else(|| series_value(value, "actual_28"));
}

fn series_value(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

const MM3_PER_M3: f64 = 1.0e9;

/// Fills in area and density where the raw inputs are measured and the
/// derived cell is not. Sentinel inputs skip derivation entirely, and the
/// pass is idempotent: derived entries come out unchanged.
pub fn derive_metrics(cubes: &mut [CubeObservation]) {
    for cube in cubes {
        if !cube.area.is_measured()
            && let (Some(length), Some(width)) = (cube.length.measured(), cube.width.measured())
        {
            cube.area = Field::Measured(length * width);
        }
        if !cube.density.is_measured()
            && let (Some(length), Some(width), Some(height), Some(weight)) = (
                cube.length.measured(),
                cube.width.measured(),
                cube.height.measured(),
                cube.weight.measured(),
            )
        {
            let volume_m3 = (length * width * height) / MM3_PER_M3;
            if volume_m3 > 0.0 {
                cube.density = Field::Measured(weight / volume_m3);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_with_cubes(count: u32) -> SampleSummary {
        SampleSummary {
            num_of_cubes: count,
            ..SampleSummary::default()
        }
    }

    #[test]
    fn flat_and_nested_encodings_normalize_identically() {
        let entry = r#"{"cube_id": "C1", "dimension_length": 150, "dimension_width": 150,
                        "dimension_height": 150, "weight": 8.1, "crushing_load": 562.5,
                        "compressive_strength": 25.0, "failure_type": "Conical"}"#;
        let flat = format!("[{entry}]");
        let nested = format!(r#"{{"cube_measurements": [{entry}]}}"#);
        let sample = sample_with_cubes(1);

        let (from_flat, _) = normalize(&sample, Some(&flat));
        let (from_nested, _) = normalize(&sample, Some(&nested));
        assert_eq!(from_flat, from_nested);
        assert_eq!(from_flat[0].length, Field::Measured(150.0));
        assert_eq!(from_flat[0].display_mark(), "C1");
    }

    #[test]
    fn cube_data_alias_is_accepted() {
        let raw = r#"{"cube_data": [{"cube_id": "B2", "dimension_length": 100}]}"#;
        let (cubes, _) = normalize(&sample_with_cubes(1), Some(raw));
        assert_eq!(cubes[0].display_mark(), "B2");
    }

    #[test]
    fn short_source_pads_with_pending_entries() {
        let raw = r#"[{"cube_id": "C1", "dimension_length": 150}]"#;
        let (cubes, _) = normalize(&sample_with_cubes(3), Some(raw));
        assert_eq!(cubes.len(), 3);
        assert!(cubes[1].length.is_pending());
        assert!(cubes[2].compressive_strength.is_pending());
        assert_eq!(cubes[2].serial, 3);
    }

    #[test]
    fn long_source_truncates_to_cube_count() {
        let raw = r#"[{"cube_id": "C1", "dimension_length": 1},
                      {"cube_id": "C2", "dimension_length": 2},
                      {"cube_id": "C3", "dimension_length": 3}]"#;
        let (cubes, _) = normalize(&sample_with_cubes(2), Some(raw));
        assert_eq!(cubes.len(), 2);
        assert_eq!(cubes[1].display_mark(), "C2");
    }

    #[test]
    fn malformed_json_degrades_to_pending_rows() {
        let (cubes, series) = normalize(&sample_with_cubes(2), Some("{not json"));
        assert_eq!(cubes.len(), 2);
        assert!(cubes.iter().all(|cube| cube.length.is_pending()));
        assert_eq!(series, StrengthSeries::default());
    }

    #[test]
    fn empty_nested_list_synthesizes_from_legacy_fields() {
        let sample = SampleSummary {
            num_of_cubes: 2,
            id_mark: Some("C7".to_string()),
            crushing_load: Some(540.0),
            compressive_strength: Some(24.0),
            ..SampleSummary::default()
        };
        let (cubes, _) = normalize(&sample, Some(r#"{"cube_measurements": []}"#));
        assert_eq!(cubes.len(), 2);
        assert_eq!(cubes[0].display_mark(), "C7");
        assert_eq!(cubes[0].crushing_load, Field::Measured(540.0));
        assert!(cubes[1].crushing_load.is_pending());
    }

    #[test]
    fn pending_sentinel_strings_survive_as_pending() {
        let raw = r#"[{"cube_id": "C1", "dimension_length": "Pending Observation",
                       "weight": "8.1"}]"#;
        let (cubes, _) = normalize(&sample_with_cubes(1), Some(raw));
        assert!(cubes[0].length.is_pending());
        assert_eq!(cubes[0].weight, Field::Measured(8.1));
    }

    #[test]
    fn strength_series_extracted_from_both_encodings() {
        let nested = r#"{"cube_measurements": [],
                         "strength_data": {"required_28": 25, "actual_28": "27.5"}}"#;
        let (_, series) = normalize(&sample_with_cubes(1), Some(nested));
        assert_eq!(series.required_28, Some(25.0));
        assert_eq!(series.actual_28, Some(27.5));

        let flat = r#"[{"strength_data": {"actual_7": 16.2}},
                       {"cube_id": "C1"}]"#;
        let (cubes, series) = normalize(&sample_with_cubes(1), Some(flat));
        assert_eq!(series.actual_7, Some(16.2));
        assert_eq!(cubes.len(), 1);
        assert_eq!(cubes[0].display_mark(), "C1");
    }

    #[test]
    fn area_derivation_and_sentinel_passthrough() {
        let raw = r#"[{"cube_id": "C1", "dimension_length": 150, "dimension_width": 150},
                      {"cube_id": "C2", "dimension_length": "Pending Observation",
                       "dimension_width": 150}]"#;
        let (mut cubes, _) = normalize(&sample_with_cubes(2), Some(raw));
        derive_metrics(&mut cubes);
        assert_eq!(cubes[0].area, Field::Measured(22_500.0));
        assert!(!cubes[1].area.is_measured());
    }

    #[test]
    fn density_matches_reference_value() {
        let raw = r#"[{"cube_id": "C1", "dimension_length": 150, "dimension_width": 150,
                       "dimension_height": 150, "weight": 8.1}]"#;
        let (mut cubes, _) = normalize(&sample_with_cubes(1), Some(raw));
        derive_metrics(&mut cubes);
        let density = *cubes[0].density.measured().expect("density derived");
        assert!((density - 2400.0).abs() < 1.0);
    }

    #[test]
    fn derive_metrics_is_idempotent() {
        let raw = r#"[{"cube_id": "C1", "dimension_length": 150, "dimension_width": 147,
                       "dimension_height": 152, "weight": 8.3}]"#;
        let (mut cubes, _) = normalize(&sample_with_cubes(1), Some(raw));
        derive_metrics(&mut cubes);
        let once = cubes.clone();
        derive_metrics(&mut cubes);
        assert_eq!(once, cubes);
    }

    #[test]
    fn precomputed_area_is_not_overwritten() {
        let raw = r#"[{"cube_id": "C1", "dimension_length": 150, "dimension_width": 150,
                       "area": 22000}]"#;
        let (mut cubes, _) = normalize(&sample_with_cubes(1), Some(raw));
        derive_metrics(&mut cubes);
        assert_eq!(cubes[0].area, Field::Measured(22_000.0));
    }
}
