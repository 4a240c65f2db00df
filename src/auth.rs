use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    /// Closed set; anything else parses to None and is treated as a mismatch
    /// wherever a role is required.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "teacher" => Some(Self::Teacher),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }

    pub fn home_view(self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Teacher => "/teacher",
            Self::Student => "/student",
        }
    }
}

/// A known user capable of authenticating. The secret is held only as a
/// salted digest; there is no plaintext column.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub secret_salt: String,
    pub secret_digest: String,
    pub role: Role,
    pub name: String,
}

/// The current authenticated user. This is exactly what gets persisted under
/// the `schoolUser` settings key: identity fields with the secret stripped
/// plus a closed set of optional profile fields. Capability flags are derived
/// on the way out, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl Session {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            name: identity.name.clone(),
            phone: None,
            avatar_url: None,
            bio: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    /// Wire form for responses: the persisted fields plus derived flags.
    pub fn to_wire(&self) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Some(obj) = v.as_object_mut() {
            obj.insert("isAdmin".into(), Value::Bool(self.is_admin()));
            obj.insert("isTeacher".into(), Value::Bool(self.is_teacher()));
            obj.insert("isStudent".into(), Value::Bool(self.is_student()));
        }
        v
    }

    /// Shallow-merge a profile patch. Only the closed profile set is
    /// mergeable; `id`, `email` and `role` are invariant for the lifetime of
    /// the session, and unknown keys are rejected outright.
    pub fn apply_profile_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        for (k, v) in patch {
            match k.as_str() {
                "name" => {
                    let s = parse_string_max(v, k, 120)?;
                    if s.is_empty() {
                        return Err("name must not be empty".into());
                    }
                    self.name = s;
                }
                "phone" => self.phone = parse_nullable_string_max(v, k, 32)?,
                "avatarUrl" => self.avatar_url = parse_nullable_string_max(v, k, 400)?,
                "bio" => self.bio = parse_nullable_string_max(v, k, 1000)?,
                "id" | "email" | "role" => {
                    return Err(format!("{} cannot be changed via profile update", k));
                }
                _ => return Err(format!("unknown profile field: {}", k)),
            }
        }
        Ok(())
    }
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_nullable_string_max(
    v: &Value,
    key: &str,
    max_len: usize,
) -> Result<Option<String>, String> {
    if v.is_null() {
        return Ok(None);
    }
    Ok(Some(parse_string_max(v, key, max_len)?))
}

pub fn secret_digest(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Repository seam for identity lookup, so the authenticator never touches
/// storage directly.
pub trait IdentityLookup {
    fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Identity>>;
}

pub struct SqliteIdentities<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteIdentities<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl IdentityLookup for SqliteIdentities<'_> {
    fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Identity>> {
        // Plain equality on a TEXT column: case-sensitive, matching the
        // historical login behavior.
        let row = self
            .conn
            .query_row(
                "SELECT id, email, secret_salt, secret_digest, role, name
                 FROM identities WHERE email = ?",
                [email],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, email, secret_salt, secret_digest, role_raw, name)) = row else {
            return Ok(None);
        };
        let Some(role) = Role::parse(&role_raw) else {
            // A row with a role outside the closed set cannot authenticate.
            return Ok(None);
        };
        Ok(Some(Identity {
            id,
            email,
            secret_salt,
            secret_digest,
            role,
            name,
        }))
    }
}

pub fn insert_identity(
    conn: &Connection,
    email: &str,
    secret: &str,
    role: Role,
    name: &str,
) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let salt = Uuid::new_v4().to_string();
    let digest = secret_digest(&salt, secret);
    conn.execute(
        "INSERT INTO identities(id, email, secret_salt, secret_digest, role, name)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&id, email, &salt, &digest, role.as_str(), name),
    )?;
    Ok(id)
}

pub fn seed_identities_if_empty(conn: &Connection) -> anyhow::Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM identities", [], |r| r.get(0))?;
    if count > 0 {
        return Ok(());
    }
    insert_identity(conn, "admin@school.edu", "admin123", Role::Admin, "Adaeze Okafor")?;
    insert_identity(conn, "teacher@school.edu", "teacher123", Role::Teacher, "Tunde Bello")?;
    insert_identity(conn, "student@school.edu", "student123", Role::Student, "Chiamaka Eze")?;
    Ok(())
}

#[derive(Debug)]
pub enum LoginOutcome {
    Success(Session),
    InvalidCredentials,
}

#[derive(Debug)]
pub enum ProfileOutcome {
    Updated(Session),
    NoSession,
    BadField(String),
}

/// Validates login attempts against the injected identity repository and is
/// the only writer of the session store. Rejections are ordinary outcomes,
/// never errors.
pub struct Authenticator<'a> {
    identities: &'a dyn IdentityLookup,
}

impl<'a> Authenticator<'a> {
    pub fn new(identities: &'a dyn IdentityLookup) -> Self {
        Self { identities }
    }

    pub fn login(
        &self,
        store: &mut SessionStore,
        conn: &Connection,
        email: &str,
        secret: &str,
    ) -> anyhow::Result<LoginOutcome> {
        let Some(identity) = self.identities.find_by_email(email)? else {
            return Ok(LoginOutcome::InvalidCredentials);
        };
        if secret_digest(&identity.secret_salt, secret) != identity.secret_digest {
            return Ok(LoginOutcome::InvalidCredentials);
        }
        let session = Session::from_identity(&identity);
        store.set(conn, session.clone());
        Ok(LoginOutcome::Success(session))
    }

    pub fn logout(&self, store: &mut SessionStore, conn: &Connection) {
        store.clear(conn);
    }

    pub fn update_profile(
        &self,
        store: &mut SessionStore,
        conn: &Connection,
        patch: &Map<String, Value>,
    ) -> ProfileOutcome {
        match store.merge(conn, patch) {
            Ok(Some(session)) => ProfileOutcome::Updated(session),
            Ok(None) => ProfileOutcome::NoSession,
            Err(msg) => ProfileOutcome::BadField(msg),
        }
    }
}
