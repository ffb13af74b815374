use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::sheet::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::assessments::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::marks::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::mapping::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::kpi::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::calc::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
