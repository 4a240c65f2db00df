use crate::guard;
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};

fn handle_evaluate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = req.params.get("view").and_then(|v| v.as_str());
    let required_role = req.params.get("requiredRole").and_then(|v| v.as_str());
    let decision = guard::evaluate(
        state.sessions.restored(),
        state.sessions.current(),
        required_role,
        view,
    );
    ok(&req.id, decision.to_wire())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "guard.evaluate" => Some(handle_evaluate(state, req)),
        _ => None,
    }
}
