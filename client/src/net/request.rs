//! Transport-neutral request and response values.
//!
//! Requests are plain data so the pipeline can re-issue them after a token
//! refresh; the body is rebuilt for each attempt rather than consumed.

#[cfg(test)]
#[path = "request_test.rs"]
mod request_test;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// One field of a multipart upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Part {
    Text { name: String, value: String },
    File { name: String, file_name: String, mime: String, bytes: Vec<u8> },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    Multipart(Vec<Part>),
}

/// An outgoing API call, relative to the configured API base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Token sent as `Authorization: Bearer <token>`; set by the pipeline.
    pub bearer: Option<String>,
    /// Set once the pipeline has spent this call's single refresh attempt.
    pub(crate) retried: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            bearer: None,
            retried: false,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_owned(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if `body` cannot be represented as JSON.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    #[must_use]
    pub fn json_value(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    #[must_use]
    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    #[must_use]
    pub fn multipart(mut self, parts: Vec<Part>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// Whether this call has already used its refresh attempt.
    #[must_use]
    pub fn is_retry(&self) -> bool {
        self.retried
    }

    /// The `Authorization` header value this request will carry, if any.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        self.bearer.as_ref().map(|token| format!("Bearer {token}"))
    }

    /// Path without query string or trailing slash, for endpoint matching.
    #[must_use]
    pub fn route(&self) -> &str {
        let path = self.path.split('?').next().unwrap_or_default();
        path.trim_end_matches('/')
    }
}

/// A completed HTTP exchange: any status, with the body read as text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with the mapped error unless the status is 2xx.
    ///
    /// # Errors
    ///
    /// Returns the `ApiError` matching the status.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() { Ok(self) } else { Err(ApiError::from_status(self.status, &self.body)) }
    }

    /// Decode a 2xx JSON body.
    ///
    /// # Errors
    ///
    /// Returns the mapped status error, or `ApiError::Decode` if the body
    /// does not match `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let ok = self.error_for_status()?;
        serde_json::from_str(&ok.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Discard a 2xx body.
    ///
    /// # Errors
    ///
    /// Returns the mapped status error.
    pub fn empty(self) -> Result<(), ApiError> {
        self.error_for_status().map(|_| ())
    }
}
