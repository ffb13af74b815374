use crate::error::InputError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Reply for a line that is not a request at all; there is no id to echo.
pub fn bad_json(message: &str) -> serde_json::Value {
    json!({
        "ok": false,
        "error": { "code": "bad_json", "message": message },
    })
}

pub fn no_session(id: &str) -> serde_json::Value {
    err(id, "no_session", "parse a sheet first", None)
}

impl InputError {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, &self.code, self.message, self.details)
    }
}

/// Serializes a result payload; serde_json only fails here on non-string map keys, which none
/// of the protocol types have.
pub fn to_result<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, InputError> {
    serde_json::to_value(value)
        .map_err(|e| InputError::new("internal", format!("serializing result: {}", e)))
}
