use crate::calc::{
    attainment_summary, calculate_all_attainments, co_mark_allocations, AttainmentResult, Thresholds,
};
use crate::error::InputError;
use crate::ipc::error::{ok, to_result};
use crate::ipc::params::{get_optional_f64, get_typed, merge_thresholds};
use crate::ipc::types::{AppState, CalcMemo, Request};
use crate::mapping::{parse_mapping, CoPoMapping};
use crate::model::{AssessmentConfig, Marks, Student};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Everything an attainment run depends on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalcInputs {
    students: Vec<Student>,
    marks: Marks,
    assessments: AssessmentConfig,
    mapping: CoPoMapping,
    thresholds: Thresholds,
}

impl CalcInputs {
    /// Hex SHA-256 of the canonical JSON form. Maps are ordered, so equal inputs hash equal.
    fn fingerprint(&self) -> Result<String, InputError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| InputError::new("internal", format!("fingerprinting inputs: {}", e)))?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}

fn is_explicit(params: &serde_json::Value) -> bool {
    ["students", "marks", "assessments"]
        .iter()
        .any(|k| params.get(k).is_some())
}

/// Explicit `students` / `marks` / `assessments` params win over the session; `mapping` and
/// `thresholds` params override the stored ones in either mode.
fn resolve_inputs(state: &AppState, params: &serde_json::Value) -> Result<CalcInputs, InputError> {
    let mapping = match params.get("mapping") {
        Some(raw) if !raw.is_null() => parse_mapping(raw)?,
        _ => state.mapping,
    };
    let thresholds = match params.get("thresholds") {
        Some(raw) => merge_thresholds(state.thresholds, raw)?,
        None => state.thresholds,
    };

    if is_explicit(params) {
        return Ok(CalcInputs {
            students: get_typed(params, "students")?,
            marks: get_typed(params, "marks")?,
            assessments: get_typed(params, "assessments")?,
            mapping,
            thresholds,
        });
    }

    let Some(session) = state.session.as_ref() else {
        return Err(InputError::new("no_session", "parse a sheet first or pass explicit inputs"));
    };
    Ok(CalcInputs {
        students: session.sheet.students.clone(),
        marks: session.sheet.marks.clone(),
        assessments: session.sheet.assessments.clone(),
        mapping,
        thresholds,
    })
}

/// Returns the result and whether it came from the memo.
fn attainment(state: &mut AppState, inputs: &CalcInputs) -> Result<(String, AttainmentResult, bool), InputError> {
    let fingerprint = inputs.fingerprint()?;
    if let Some(memo) = state.memo.as_ref().filter(|m| m.fingerprint == fingerprint) {
        tracing::debug!(%fingerprint, "attainment served from memo");
        return Ok((fingerprint, memo.result.clone(), true));
    }
    let result = calculate_all_attainments(
        &inputs.students,
        &inputs.marks,
        &inputs.assessments,
        &inputs.mapping,
        &inputs.thresholds,
    );
    state.memo = Some(CalcMemo {
        fingerprint: fingerprint.clone(),
        result: result.clone(),
    });
    Ok((fingerprint, result, false))
}

fn calc_attainment(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, InputError> {
    let inputs = resolve_inputs(state, params)?;
    let (fingerprint, result, cached) = attainment(state, &inputs)?;
    let mut value = to_result(&result)?;
    value["fingerprint"] = json!(fingerprint);
    value["cached"] = json!(cached);
    Ok(value)
}

fn calc_co_allocations(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, InputError> {
    let config: AssessmentConfig = if params.get("assessments").is_some() {
        get_typed(params, "assessments")?
    } else {
        match state.session.as_ref() {
            Some(s) => s.sheet.assessments.clone(),
            None => {
                return Err(InputError::new("no_session", "parse a sheet first or pass assessments"))
            }
        }
    };
    Ok(json!({
        "allocations": to_result(&co_mark_allocations(&config))?,
        "totalMaxMarks": config.total_max_marks(),
    }))
}

fn calc_summary(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, InputError> {
    let goal = get_optional_f64(params, "departmentGoal")?.unwrap_or(state.department_goal);
    if !(0.0..=100.0).contains(&goal) {
        return Err(InputError::bad_params("departmentGoal must be in [0, 100]")
            .with_details(json!({ "departmentGoal": goal })));
    }
    let inputs = resolve_inputs(state, params)?;
    let (fingerprint, result, _) = attainment(state, &inputs)?;
    let summary = attainment_summary(
        &inputs.students,
        &inputs.assessments,
        &inputs.mapping,
        &result,
        goal,
    );
    let mut value = to_result(&summary)?;
    value["fingerprint"] = json!(fingerprint);
    Ok(value)
}

fn handle_calc_attainment(state: &mut AppState, req: &Request) -> serde_json::Value {
    match calc_attainment(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_calc_co_allocations(state: &mut AppState, req: &Request) -> serde_json::Value {
    match calc_co_allocations(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_calc_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    match calc_summary(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.attainment" => Some(handle_calc_attainment(state, req)),
        "calc.coAllocations" => Some(handle_calc_co_allocations(state, req)),
        "calc.summary" => Some(handle_calc_summary(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::Assessment;

    fn inputs() -> CalcInputs {
        CalcInputs {
            students: vec![Student {
                id: "1".into(),
                name: "Ann".into(),
            }],
            marks: [(
                "1".to_string(),
                [("cts_CT-1".to_string(), 8.0)].into_iter().collect(),
            )]
            .into_iter()
            .collect(),
            assessments: AssessmentConfig {
                class_tests: vec![Assessment::new("CT-1", 10.0, "CO1")],
                ..AssessmentConfig::default()
            },
            mapping: CoPoMapping::from_pairs([(1, 1)]),
            thresholds: Thresholds::default(),
        }
    }

    #[test]
    fn fingerprint_tracks_inputs() {
        let a = inputs();
        let mut b = inputs();
        assert_eq!(a.fingerprint().expect("fp"), b.fingerprint().expect("fp"));
        assert_eq!(a.fingerprint().expect("fp").len(), 64);
        b.thresholds.kpi_co = 60.0;
        assert_ne!(a.fingerprint().expect("fp"), b.fingerprint().expect("fp"));
    }

    #[test]
    fn memo_hits_on_identical_inputs() {
        let mut state = AppState::new(&Config::default());
        let i = inputs();
        let (fp1, r1, cached1) = attainment(&mut state, &i).expect("first");
        let (fp2, r2, cached2) = attainment(&mut state, &i).expect("second");
        assert!(!cached1);
        assert!(cached2);
        assert_eq!(fp1, fp2);
        assert_eq!(r1, r2);
    }

    #[test]
    fn session_mode_without_session() {
        let state = AppState::new(&Config::default());
        let e = resolve_inputs(&state, &json!({})).unwrap_err();
        assert_eq!(e.code, "no_session");
    }
}
