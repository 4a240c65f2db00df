use crate::auth::Role;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::access::{require_role, require_session};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_events_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_session(state, req) {
        return resp;
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT id, title, starts_at, location, created_by FROM events ORDER BY starts_at",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let starts_at: String = row.get(2)?;
            let location: Option<String> = row.get(3)?;
            let created_by: String = row.get(4)?;
            Ok(json!({
                "id": id,
                "title": title,
                "startsAt": starts_at,
                "location": location,
                "createdBy": created_by
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(events) => ok(&req.id, json!({ "events": events })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_events_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let created_by = match require_role(state, req, &[Role::Admin, Role::Teacher]) {
        Ok(session) => session.email.clone(),
        Err(resp) => return resp,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let title = match req.params.get("title").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing title", None),
    };
    if title.is_empty() {
        return err(&req.id, "bad_params", "title must not be empty", None);
    }
    let starts_at = match req.params.get("startsAt").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing startsAt", None),
    };
    if chrono::DateTime::parse_from_rfc3339(&starts_at).is_err() {
        return err(&req.id, "bad_params", "startsAt must be RFC 3339", None);
    }
    let location = req
        .params
        .get("location")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());

    let event_id = Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO events(id, title, starts_at, location, created_by, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&event_id, &title, &starts_at, &location, &created_by, &created_at),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "events" })),
        );
    }

    ok(&req.id, json!({ "eventId": event_id, "title": title }))
}

fn handle_events_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_role(state, req, &[Role::Admin, Role::Teacher]) {
        return resp;
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let event_id = match req.params.get("eventId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing eventId", None),
    };

    let deleted = match conn.execute("DELETE FROM events WHERE id = ?", [&event_id]) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "event not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "events.list" => Some(handle_events_list(state, req)),
        "events.create" => Some(handle_events_create(state, req)),
        "events.delete" => Some(handle_events_delete(state, req)),
        _ => None,
    }
}
