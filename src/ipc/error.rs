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

/// Toast payload carried alongside expected rejections and auth results. The
/// UI shows it; nothing branches on it.
pub fn notice(kind: &str, message: impl Into<String>) -> serde_json::Value {
    json!({
        "kind": kind,
        "message": message.into(),
    })
}
