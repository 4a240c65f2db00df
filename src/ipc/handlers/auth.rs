use crate::auth::{Authenticator, LoginOutcome, ProfileOutcome, SqliteIdentities};
use crate::ipc::error::{err, notice, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(email) = req.params.get("email").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let Some(secret) = req.params.get("secret").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing secret", None);
    };
    // Optional originally-requested view, echoed back so the UI can return
    // the user there instead of the role home.
    let from = req.params.get("from").and_then(|v| v.as_str());

    let identities = SqliteIdentities::new(conn);
    let authn = Authenticator::new(&identities);
    match authn.login(&mut state.sessions, conn, email, secret) {
        Ok(LoginOutcome::Success(session)) => {
            let redirect_to = from.unwrap_or_else(|| session.role.home_view());
            ok(
                &req.id,
                json!({
                    "session": session.to_wire(),
                    "redirectTo": redirect_to,
                    "notice": notice("success", format!("Welcome back, {}!", session.name)),
                }),
            )
        }
        Ok(LoginOutcome::InvalidCredentials) => err(
            &req.id,
            "invalid_credentials",
            "email or secret did not match",
            Some(json!({ "notice": notice("error", "Invalid email or secret.") })),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Idempotent: logging out while already logged out (or before a
    // workspace exists) is still a success.
    if let Some(conn) = state.db.as_ref() {
        let identities = SqliteIdentities::new(conn);
        Authenticator::new(&identities).logout(&mut state.sessions, conn);
    }
    ok(
        &req.id,
        json!({
            "notice": notice("success", "Signed out."),
        }),
    )
}

fn handle_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "restored": state.sessions.restored(),
            "session": state.sessions.current().map(|s| s.to_wire()),
        }),
    )
}

fn handle_profile_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let identities = SqliteIdentities::new(conn);
    let authn = Authenticator::new(&identities);
    match authn.update_profile(&mut state.sessions, conn, patch) {
        ProfileOutcome::Updated(session) => ok(
            &req.id,
            json!({
                "session": session.to_wire(),
                "notice": notice("success", "Profile updated."),
            }),
        ),
        ProfileOutcome::NoSession => err(
            &req.id,
            "no_session",
            "no active session to update",
            Some(json!({ "notice": notice("error", "Sign in to update your profile.") })),
        ),
        ProfileOutcome::BadField(msg) => err(&req.id, "bad_params", msg, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        "auth.profile.update" => Some(handle_profile_update(state, req)),
        _ => None,
    }
}
