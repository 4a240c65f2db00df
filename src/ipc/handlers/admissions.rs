use crate::auth::Role;
use crate::ipc::error::{err, notice, ok};
use crate::ipc::handlers::access::require_role;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

/// The admission form is the one public surface: prospective families are not
/// logged in, so submit requires no session. Reading applications does.
fn handle_admissions_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let applicant_name = match req.params.get("applicantName").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing applicantName", None),
    };
    let email = match req.params.get("email").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing email", None),
    };
    let grade_applied = match req.params.get("gradeApplied").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing gradeApplied", None),
    };
    if applicant_name.is_empty() || grade_applied.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "applicantName and gradeApplied must not be empty",
            None,
        );
    }
    if !email.contains('@') {
        return err(&req.id, "bad_params", "email must contain @", None);
    }
    let note = req
        .params
        .get("note")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());

    let admission_id = Uuid::new_v4().to_string();
    let submitted_at = chrono::Utc::now().to_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO admissions(id, applicant_name, email, grade_applied, note, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &admission_id,
            &applicant_name,
            &email,
            &grade_applied,
            &note,
            &submitted_at,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "admissions" })),
        );
    }

    ok(
        &req.id,
        json!({
            "admissionId": admission_id,
            "notice": notice("success", "Application received. We will be in touch."),
        }),
    )
}

fn handle_admissions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_role(state, req, &[Role::Admin]) {
        return resp;
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT id, applicant_name, email, grade_applied, note, submitted_at
         FROM admissions ORDER BY submitted_at DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let applicant_name: String = row.get(1)?;
            let email: String = row.get(2)?;
            let grade_applied: String = row.get(3)?;
            let note: Option<String> = row.get(4)?;
            let submitted_at: String = row.get(5)?;
            Ok(json!({
                "id": id,
                "applicantName": applicant_name,
                "email": email,
                "gradeApplied": grade_applied,
                "note": note,
                "submittedAt": submitted_at
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(admissions) => ok(&req.id, json!({ "admissions": admissions })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admissions.submit" => Some(handle_admissions_submit(state, req)),
        "admissions.list" => Some(handle_admissions_list(state, req)),
        _ => None,
    }
}
