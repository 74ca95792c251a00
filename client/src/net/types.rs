//! Wire DTOs for the auth endpoints and the opaque user record.
//!
//! DESIGN
//! ======
//! The client never interprets user fields beyond display, so `UserRecord`
//! wraps the raw JSON object and serializes back unchanged.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};

/// Access/refresh token pair held by the token store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    /// Without a refresh token the access token cannot be silently renewed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token }
    }

    /// Whether a 401 on this pair can be recovered by a refresh round-trip.
    #[must_use]
    pub fn renewable(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Identity returned by the backend (`id`, `username`, profile sub-object, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(pub serde_json::Value);

impl UserRecord {
    /// Backend identifier, rendered as text whether it is a number or a string.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.0.get("username").and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Body of a successful `POST /users/login` or `POST /users/register`.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserRecord,
}

impl AuthGrant {
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

/// Body of a successful `POST /users/refresh`.
#[derive(Clone, Debug, Deserialize)]
pub struct RefreshGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Body sent to `POST /users/refresh`.
#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Registration payload sent as JSON to `POST /users/register`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RegisterFields {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Any further fields the backend accepts (bio, etc.).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of `GET /notifications/unread/count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct UnreadCount {
    pub count: u64,
}
