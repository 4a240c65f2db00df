use serde_json::{json, Value};

use crate::auth::{Role, Session};

/// Where an unauthenticated user is sent.
pub const LOGIN_VIEW: &str = "/login";
/// Where an authenticated user lands when a view's role does not match.
pub const DEFAULT_VIEW: &str = "/";

/// Outcome of one guard evaluation. `Loading` means the session store has not
/// settled yet and the caller should render a neutral waiting indicator
/// instead of redirecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Loading,
    Render,
    RedirectToLogin { from: Option<String> },
    RedirectToDefault,
}

impl Decision {
    pub fn to_wire(&self) -> Value {
        match self {
            Decision::Loading => json!({ "outcome": "loading" }),
            Decision::Render => json!({ "outcome": "render" }),
            Decision::RedirectToLogin { from } => json!({
                "outcome": "redirect",
                "to": LOGIN_VIEW,
                "from": from,
            }),
            Decision::RedirectToDefault => json!({
                "outcome": "redirect",
                "to": DEFAULT_VIEW,
            }),
        }
    }
}

/// Pure function of (store settled, session, required role, requested view).
/// A required role outside the closed set never parses, so it can never
/// match: misconfigured directives deny access rather than granting it.
pub fn evaluate(
    restored: bool,
    session: Option<&Session>,
    required_role: Option<&str>,
    view: Option<&str>,
) -> Decision {
    if !restored {
        return Decision::Loading;
    }
    let Some(session) = session else {
        return Decision::RedirectToLogin {
            from: view.map(|v| v.to_string()),
        };
    };
    let Some(required) = required_role else {
        return Decision::Render;
    };
    match Role::parse(required) {
        Some(role) if role == session.role => Decision::Render,
        _ => Decision::RedirectToDefault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        Session {
            id: "id-1".into(),
            email: format!("{}@school.edu", role.as_str()),
            role,
            name: "Test User".into(),
            phone: None,
            avatar_url: None,
            bio: None,
        }
    }

    #[test]
    fn loading_wins_over_everything() {
        assert_eq!(evaluate(false, None, None, Some("/admin")), Decision::Loading);
        let s = session(Role::Admin);
        assert_eq!(evaluate(false, Some(&s), Some("admin"), None), Decision::Loading);
    }

    #[test]
    fn no_session_redirects_to_login_for_every_required_role() {
        for required in [None, Some("admin"), Some("teacher"), Some("student")] {
            let d = evaluate(true, None, required, Some("/courses"));
            assert_eq!(
                d,
                Decision::RedirectToLogin {
                    from: Some("/courses".into())
                }
            );
        }
    }

    #[test]
    fn authenticated_without_directive_renders() {
        let s = session(Role::Student);
        assert_eq!(evaluate(true, Some(&s), None, Some("/events")), Decision::Render);
    }

    #[test]
    fn matching_role_renders_mismatch_goes_to_default() {
        let s = session(Role::Student);
        assert_eq!(evaluate(true, Some(&s), Some("student"), None), Decision::Render);
        // Mismatch is a default-view redirect, distinct from the login case.
        assert_eq!(
            evaluate(true, Some(&s), Some("admin"), Some("/admin")),
            Decision::RedirectToDefault
        );
    }

    #[test]
    fn unknown_required_role_fails_closed() {
        let s = session(Role::Admin);
        assert_eq!(
            evaluate(true, Some(&s), Some("superuser"), None),
            Decision::RedirectToDefault
        );
        assert_eq!(
            evaluate(true, Some(&s), Some("Admin"), None),
            Decision::RedirectToDefault
        );
    }

    #[test]
    fn login_redirect_carries_the_requested_view() {
        let d = evaluate(true, None, Some("teacher"), Some("/teacher/marks"));
        let wire = d.to_wire();
        assert_eq!(wire.get("to").and_then(|v| v.as_str()), Some(LOGIN_VIEW));
        assert_eq!(
            wire.get("from").and_then(|v| v.as_str()),
            Some("/teacher/marks")
        );
    }
}
