use crate::calc::co_mark_allocations;
use crate::error::InputError;
use crate::ipc::error::{no_session, ok, to_result};
use crate::ipc::params::{get_optional_f64, get_required_str};
use crate::ipc::types::{AppState, Request, Session};
use crate::model::{co_key, parse_outcome_key, Family};
use serde_json::json;

/// `""` clears; otherwise `CO<n>` in any case, normalized.
fn parse_co(raw: &str) -> Result<String, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    parse_outcome_key(&trimmed.to_ascii_uppercase(), "CO")
        .map(co_key)
        .ok_or_else(|| {
            InputError::bad_params("co must be CO1..CO12 or empty").with_details(json!({ "co": raw }))
        })
}

fn assessments_update(
    session: &mut Session,
    params: &serde_json::Value,
) -> Result<serde_json::Value, InputError> {
    let family_raw = get_required_str(params, "family")?;
    let Some(family) = Family::parse(&family_raw) else {
        return Err(InputError::bad_params("unknown family")
            .with_details(json!({ "family": family_raw })));
    };
    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    if name.trim().is_empty() && family.single_label().is_none() {
        return Err(InputError::bad_params("missing name"));
    }

    let max_marks = get_optional_f64(params, "maxMarks")?;
    if let Some(m) = max_marks {
        if m < 0.0 {
            return Err(InputError::bad_params("maxMarks must be >= 0")
                .with_details(json!({ "maxMarks": m })));
        }
    }
    let co = match params.get("co") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(parse_co(s)?),
        Some(other) => {
            return Err(InputError::bad_params("co must be a string")
                .with_details(json!({ "co": other })))
        }
    };

    let Some(assessment) = session.sheet.assessments.find_mut(family, &name) else {
        return Err(InputError::new("not_found", "assessment not found")
            .with_details(json!({ "family": family.as_str(), "name": name })));
    };
    if let Some(m) = max_marks {
        assessment.max_marks = m;
    }
    if let Some(c) = co {
        assessment.co = c;
    }
    let updated = assessment.clone();
    session.touch();

    tracing::debug!(family = family.as_str(), name = %updated.name, "assessment updated");
    Ok(json!({
        "family": family.as_str(),
        "assessment": to_result(&updated)?,
        "coAllocations": to_result(&co_mark_allocations(&session.sheet.assessments))?,
    }))
}

fn handle_assessments_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.session.as_mut() else {
        return no_session(&req.id);
    };
    match assessments_update(session, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assessments.update" => Some(handle_assessments_update(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn co_normalization() {
        assert_eq!(parse_co(" co3 ").expect("co"), "CO3");
        assert_eq!(parse_co("").expect("empty"), "");
        assert!(parse_co("CO13").is_err());
        assert!(parse_co("PO1").is_err());
    }
}
