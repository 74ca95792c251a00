//! Error taxonomy for the session core.
//!
//! DESIGN
//! ======
//! Three layers, each wrapping the one below: `StoreError` (token backend),
//! `ApiError` (transport + HTTP status mapping), and `SessionError` (what the
//! session controller reports to UI code). Backend error bodies follow the
//! `{ "detail": ... }` convention; `extract_detail` pulls a readable message
//! out of either the string or the validation-list form.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

// =============================================================================
// STORE
// =============================================================================

/// Failures reading or writing persisted tokens.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage medium is not reachable (e.g. `localStorage` disabled).
    #[error("token storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the backing file failed.
    #[error("token storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but does not hold a JSON string map.
    #[error("token storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

// =============================================================================
// API
// =============================================================================

/// Errors produced by the request pipeline and resource endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// A 401 could not be recovered: the refresh token was missing or rejected.
    #[error("session expired")]
    SessionExpired,

    /// The backend answered 401.
    #[error("unauthorized: {detail}")]
    Unauthorized { detail: String },

    /// The backend answered 403.
    #[error("forbidden: {detail}")]
    Forbidden { detail: String },

    /// The backend answered 404.
    #[error("not found: {detail}")]
    NotFound { detail: String },

    /// Any other 4xx, carrying the backend's `detail` message.
    #[error("request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// A non-success status outside the 4xx range.
    #[error("unexpected status {status}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Map a non-success HTTP status and body to an error variant.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = || extract_detail(body).unwrap_or_else(|| format!("HTTP {status}"));
        match status {
            401 => Self::Unauthorized { detail: detail() },
            403 => Self::Forbidden { detail: detail() },
            404 => Self::NotFound { detail: detail() },
            400..=499 => Self::Rejected { status, detail: detail() },
            _ => Self::Status { status, body: body.to_owned() },
        }
    }

    /// The HTTP status behind this error, if the backend produced one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Rejected { status, .. } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull a human-readable message out of a backend error body.
///
/// Accepts `{"detail": "text"}`, `{"detail": [{"msg": "text"}, ...]}`, or a
/// plain-text body. Returns `None` for an empty body.
#[must_use]
pub fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Some(trimmed.to_owned());
    };
    match value.get("detail") {
        Some(serde_json::Value::String(text)) => Some(text.clone()),
        Some(serde_json::Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                .collect();
            if messages.is_empty() { None } else { Some(messages.join("; ")) }
        }
        _ => Some(trimmed.to_owned()),
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Errors reported by [`crate::SessionController`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Login was rejected by the backend.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Registration was rejected (duplicate username/email or malformed fields).
    #[error("registration rejected: {0}")]
    Validation(String),

    /// No usable credentials remain; the tab is anonymous.
    #[error("session expired")]
    SessionExpired,

    /// Transport failure on a session call.
    #[error("network error: {0}")]
    Network(String),

    /// The session changed (logout, another login) while the call was in
    /// flight, so its result was discarded.
    #[error("session changed while the request was in flight")]
    Superseded,

    #[error(transparent)]
    Api(ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::SessionExpired => Self::SessionExpired,
            ApiError::Network(message) => Self::Network(message),
            ApiError::Store(store) => Self::Store(store),
            other => Self::Api(other),
        }
    }
}
