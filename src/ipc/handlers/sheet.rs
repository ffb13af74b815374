use crate::error::InputError;
use crate::ipc::error::{no_session, ok, to_result};
use crate::ipc::params::{get_grid, get_optional_f64};
use crate::ipc::types::{AppState, Request, Session};
use crate::sheet::parse_spreadsheet_with;
use crate::template::QuestionSplit;
use serde_json::json;

fn question_split(params: &serde_json::Value) -> Result<QuestionSplit, InputError> {
    let Some(slots) = get_optional_f64(params, "midTermSlots")? else {
        return Ok(QuestionSplit::default());
    };
    if slots < 0.0 || slots.fract() != 0.0 || slots > 64.0 {
        return Err(InputError::bad_params("midTermSlots must be a whole number in 0..=64")
            .with_details(json!({ "midTermSlots": slots })));
    }
    Ok(QuestionSplit {
        mid_term_slots: slots as usize,
    })
}

fn sheet_parse(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, InputError> {
    let grid = get_grid(params)?;
    let split = question_split(params)?;
    let sheet = parse_spreadsheet_with(&grid, &split);
    let session = Session::new(sheet);
    tracing::info!(
        session_id = %session.session_id,
        students = session.sheet.students.len(),
        "session replaced"
    );
    let result = to_result(&session)?;
    state.session = Some(session);
    state.memo = None;
    Ok(result)
}

fn handle_sheet_parse(state: &mut AppState, req: &Request) -> serde_json::Value {
    match sheet_parse(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_session_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.session.as_ref() else {
        return no_session(&req.id);
    };
    match to_result(session) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_session_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cleared = state.session.take().map(|s| s.session_id);
    state.memo = None;
    ok(&req.id, json!({ "cleared": cleared.is_some(), "sessionId": cleared }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sheet.parse" => Some(handle_sheet_parse(state, req)),
        "session.get" => Some(handle_session_get(state, req)),
        "session.clear" => Some(handle_session_clear(state, req)),
        _ => None,
    }
}
