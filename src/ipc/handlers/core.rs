use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "hasSession": state.session.is_some(),
            "sessionId": state.session.as_ref().map(|s| s.session_id.clone()),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
