//! Readers for request params. Every failure is a `bad_params` `InputError`.

use crate::calc::Thresholds;
use crate::error::InputError;
use crate::grid::Grid;
use serde::de::DeserializeOwned;
use serde_json::json;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, InputError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| InputError::bad_params(format!("missing {}", key)))
}

/// `None` when absent or null; an error when present but not a number.
pub fn get_optional_f64(params: &serde_json::Value, key: &str) -> Result<Option<f64>, InputError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            InputError::bad_params(format!("{} must be a number", key))
                .with_details(json!({ key: v }))
        }),
    }
}

pub fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, InputError> {
    get_optional_f64(params, key)?
        .ok_or_else(|| InputError::bad_params(format!("missing {}", key)))
}

/// Deserializes `params[key]` into `T`, naming the key on failure.
pub fn get_typed<T: DeserializeOwned>(params: &serde_json::Value, key: &str) -> Result<T, InputError> {
    let Some(raw) = params.get(key) else {
        return Err(InputError::bad_params(format!("missing {}", key)));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        InputError::bad_params(format!("invalid {}", key))
            .with_details(json!({ "reason": e.to_string() }))
    })
}

pub fn get_grid(params: &serde_json::Value) -> Result<Grid, InputError> {
    match params.get("rows") {
        Some(serde_json::Value::Array(_)) => get_typed(params, "rows"),
        Some(_) => Err(InputError::bad_params("rows must be an array of arrays")),
        None => Err(InputError::bad_params("missing rows")),
    }
}

/// Overlays any of `targetPassMarks` / `kpiCO` / `kpiPO` present in `raw` onto `base` and
/// range-checks the result.
pub fn merge_thresholds(base: Thresholds, raw: &serde_json::Value) -> Result<Thresholds, InputError> {
    if !(raw.is_object() || raw.is_null()) {
        return Err(InputError::bad_params("thresholds must be an object"));
    }
    let merged = Thresholds {
        target_pass_marks: get_optional_f64(raw, "targetPassMarks")?
            .unwrap_or(base.target_pass_marks),
        kpi_co: get_optional_f64(raw, "kpiCO")?.unwrap_or(base.kpi_co),
        kpi_po: get_optional_f64(raw, "kpiPO")?.unwrap_or(base.kpi_po),
    };
    merged.validate()?;
    Ok(merged)
}
