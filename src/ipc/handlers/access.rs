use crate::auth::{Role, Session};
use crate::ipc::error::{err, notice};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Server-side counterparts of the guard's two redirect outcomes: no session
/// is `unauthenticated`, a live session with the wrong role is `forbidden`.
pub fn require_session<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Session, serde_json::Value> {
    match state.sessions.current() {
        Some(session) => Ok(session),
        None => Err(err(
            &req.id,
            "unauthenticated",
            "sign in first",
            Some(json!({ "notice": notice("error", "Please sign in to continue.") })),
        )),
    }
}

pub fn require_role<'a>(
    state: &'a AppState,
    req: &Request,
    allowed: &[Role],
) -> Result<&'a Session, serde_json::Value> {
    let session = require_session(state, req)?;
    if allowed.contains(&session.role) {
        return Ok(session);
    }
    let wanted = allowed
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(" or ");
    Err(err(
        &req.id,
        "forbidden",
        format!("requires role {}", wanted),
        Some(json!({ "notice": notice("error", "You do not have access to that.") })),
    ))
}
