use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::auth::Session;
use crate::db;

/// Fixed settings key the persisted session record lives under.
pub const SESSION_KEY: &str = "schoolUser";

/// Holds the single current session and owns its persisted record. Every
/// mutation writes through to the settings table; a storage failure is logged
/// and the in-memory state stays authoritative for the rest of the process
/// (worst case the user is logged out on next start).
pub struct SessionStore {
    current: Option<Session>,
    restored: bool,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            current: None,
            restored: false,
        }
    }

    /// True once `restore` has run. Guard evaluations before that point must
    /// report loading rather than redirecting.
    pub fn restored(&self) -> bool {
        self.restored
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Adopt the persisted record if it parses; otherwise start
    /// unauthenticated. A malformed record is a warning, never a fault.
    pub fn restore(&mut self, conn: &Connection) {
        self.current = match db::settings_get_json(conn, SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_value::<Session>(raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("persisted session record is malformed, starting logged out: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("failed reading persisted session, starting logged out: {e}");
                None
            }
        };
        self.restored = true;
    }

    pub fn set(&mut self, conn: &Connection, session: Session) {
        persist(conn, &session);
        self.current = Some(session);
        self.restored = true;
    }

    /// Shallow-merge profile fields into the current session and re-persist.
    /// `Ok(None)` means no active session; `Err` carries the field-validation
    /// message. Role, email and id are invariant (enforced by the patch).
    pub fn merge(
        &mut self,
        conn: &Connection,
        patch: &Map<String, Value>,
    ) -> Result<Option<Session>, String> {
        let Some(current) = self.current.as_mut() else {
            return Ok(None);
        };
        let mut candidate = current.clone();
        candidate.apply_profile_patch(patch)?;
        persist(conn, &candidate);
        *current = candidate.clone();
        Ok(Some(candidate))
    }

    pub fn clear(&mut self, conn: &Connection) {
        self.current = None;
        self.restored = true;
        if let Err(e) = db::settings_delete(conn, SESSION_KEY) {
            tracing::warn!("failed deleting persisted session record: {e}");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn persist(conn: &Connection, session: &Session) {
    let value = match serde_json::to_value(session) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("failed serializing session record: {e}");
            return;
        }
    };
    if let Err(e) = db::settings_set_json(conn, SESSION_KEY, &value) {
        tracing::warn!("failed persisting session record: {e}");
    }
}
