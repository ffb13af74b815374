use crate::error::InputError;
use crate::ipc::error::{no_session, ok};
use crate::ipc::params::{get_required_f64, get_required_str};
use crate::ipc::types::{AppState, Request, Session};
use serde_json::json;

fn marks_update(session: &mut Session, params: &serde_json::Value) -> Result<serde_json::Value, InputError> {
    let student_id = get_required_str(params, "studentId")?;
    let key = get_required_str(params, "key")?;
    let value = get_required_f64(params, "value")?;
    if !value.is_finite() || value < 0.0 {
        return Err(InputError::bad_params("value must be a finite number >= 0")
            .with_details(json!({ "value": value })));
    }

    if !session.sheet.assessments.mark_keys().contains(&key) {
        return Err(InputError::new("not_found", "unknown mark key").with_details(json!({ "key": key })));
    }
    let Some(record) = session.sheet.marks.get_mut(&student_id) else {
        return Err(InputError::new("not_found", "student not found")
            .with_details(json!({ "studentId": student_id })));
    };
    let previous = record.insert(key.clone(), value).unwrap_or(0.0);
    session.touch();

    Ok(json!({
        "studentId": student_id,
        "key": key,
        "value": value,
        "previous": previous,
    }))
}

fn handle_marks_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.session.as_mut() else {
        return no_session(&req.id);
    };
    match marks_update(session, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.update" => Some(handle_marks_update(state, req)),
        _ => None,
    }
}
