use crate::error::InputError;
use crate::ipc::error::{ok, to_result};
use crate::ipc::params::merge_thresholds;
use crate::ipc::types::{AppState, Request};

fn handle_kpi_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match to_result(&state.thresholds) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn kpi_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, InputError> {
    let next = merge_thresholds(state.thresholds, params)?;
    state.thresholds = next;
    tracing::info!(
        target_pass_marks = next.target_pass_marks,
        kpi_co = next.kpi_co,
        kpi_po = next.kpi_po,
        "thresholds updated"
    );
    to_result(&next)
}

fn handle_kpi_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    match kpi_set(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "kpi.get" => Some(handle_kpi_get(state, req)),
        "kpi.set" => Some(handle_kpi_set(state, req)),
        _ => None,
    }
}
