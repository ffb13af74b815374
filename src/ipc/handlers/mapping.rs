use crate::error::InputError;
use crate::ipc::error::{ok, to_result};
use crate::ipc::types::{AppState, Request};
use crate::mapping::parse_mapping;
use serde_json::json;

fn mapping_payload(state: &AppState) -> Result<serde_json::Value, InputError> {
    Ok(json!({
        "mapping": to_result(&state.mapping)?,
        "links": state.mapping.link_count(),
    }))
}

fn mapping_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, InputError> {
    let Some(raw) = params.get("mapping") else {
        return Err(InputError::bad_params("missing mapping"));
    };
    state.mapping = parse_mapping(raw)?;
    tracing::debug!(links = state.mapping.link_count(), "mapping replaced");
    mapping_payload(state)
}

fn handle_mapping_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match mapping_payload(state) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_mapping_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    match mapping_set(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "mapping.get" => Some(handle_mapping_get(state, req)),
        "mapping.set" => Some(handle_mapping_set(state, req)),
        _ => None,
    }
}
