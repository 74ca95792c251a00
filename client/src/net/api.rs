//! Typed REST endpoints, all routed through the [`AuthPipeline`].
//!
//! SYSTEM CONTEXT
//! ==============
//! Session code uses the auth calls (`login`, `register`, `current_user`);
//! feature code uses the resource groups (`users`, `posts`, `social`,
//! `notifications`). Resource records are opaque JSON: the client displays
//! them but never interprets them.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx statuses become `ApiError` variants via `ApiResponse::json`;
//! 403/404 and friends are handed back untouched for UI-level display.

#![allow(clippy::missing_errors_doc)]

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::ApiError;

use super::pipeline::{AuthPipeline, LOGIN_ENDPOINT, REGISTER_ENDPOINT};
use super::request::{ApiRequest, ApiResponse, Part};
use super::types::{AuthGrant, RegisterFields, UnreadCount, UserRecord};

pub const CURRENT_USER_ENDPOINT: &str = "/users/me";

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 50;

/// An upload for the multipart endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    fn into_part(self, field: &str) -> Part {
        Part::File { name: field.to_owned(), file_name: self.file_name, mime: self.mime, bytes: self.bytes }
    }
}

fn text(name: &str, value: impl Into<String>) -> Part {
    Part::Text { name: name.to_owned(), value: value.into() }
}

/// Handle on the backend; cheap to clone.
#[derive(Clone)]
pub struct Api {
    pipeline: Arc<AuthPipeline>,
}

impl Api {
    #[must_use]
    pub fn new(pipeline: Arc<AuthPipeline>) -> Self {
        Self { pipeline }
    }

    #[must_use]
    pub fn pipeline(&self) -> &Arc<AuthPipeline> {
        &self.pipeline
    }

    /// Run an arbitrary request through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns transport and session-expiry errors; statuses are not mapped.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.pipeline.execute(request).await
    }

    async fn fetch(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.send(request).await?.json()
    }

    async fn fire(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.send(request).await?.empty()
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// `POST /users/login` with form-encoded credentials.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized`/`Rejected` when the backend refuses.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthGrant, ApiError> {
        let request = ApiRequest::post(LOGIN_ENDPOINT)
            .form(vec![("username".to_owned(), username.to_owned()), ("password".to_owned(), password.to_owned())]);
        self.send(request).await?.json()
    }

    /// `POST /users/register` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` with the backend's detail on conflict or
    /// validation failure.
    pub async fn register(&self, fields: &RegisterFields) -> Result<AuthGrant, ApiError> {
        let request = ApiRequest::post(REGISTER_ENDPOINT).json(fields)?;
        self.send(request).await?.json()
    }

    /// `GET /users/me`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` if the token could not be renewed.
    pub async fn current_user(&self) -> Result<UserRecord, ApiError> {
        self.send(ApiRequest::get(CURRENT_USER_ENDPOINT)).await?.json()
    }

    // =========================================================================
    // USERS
    // =========================================================================

    pub async fn list_users(&self) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get("/users/")).await
    }

    pub async fn user(&self, user_id: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/users/{user_id}"))).await
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/users/username/{username}"))).await
    }

    pub async fn update_profile(&self, profile: &Value) -> Result<UserRecord, ApiError> {
        self.send(ApiRequest::put("/users/profile").json_value(profile.clone())).await?.json()
    }

    pub async fn upload_profile_picture(&self, file: Upload) -> Result<UserRecord, ApiError> {
        let request = ApiRequest::post("/users/profile/picture").multipart(vec![file.into_part("file")]);
        self.send(request).await?.json()
    }

    pub async fn search_users(&self, query: &str, limit: u32) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/users/search/{query}")).query("limit", limit)).await
    }

    // =========================================================================
    // POSTS
    // =========================================================================

    pub async fn create_post(&self, caption: Option<&str>, image: Upload, tags: Option<&str>) -> Result<Value, ApiError> {
        let mut parts = Vec::new();
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            parts.push(text("caption", caption));
        }
        parts.push(image.into_part("image"));
        if let Some(tags) = tags.filter(|t| !t.is_empty()) {
            parts.push(text("tags", tags));
        }
        self.fetch(ApiRequest::post("/posts/").multipart(parts)).await
    }

    pub async fn posts(&self, skip: u32, limit: u32) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get("/posts/").query("skip", skip).query("limit", limit)).await
    }

    /// Feed of posts from followed users.
    pub async fn following_posts(&self, skip: u32, limit: u32) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get("/posts/following").query("skip", skip).query("limit", limit))
            .await
    }

    pub async fn post(&self, post_id: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/posts/{post_id}"))).await
    }

    pub async fn user_posts(&self, user_id: &str, skip: u32, limit: u32) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/posts/user/{user_id}")).query("skip", skip).query("limit", limit))
            .await
    }

    pub async fn update_post(&self, post_id: &str, changes: &Value) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::put(format!("/posts/{post_id}")).json_value(changes.clone())).await
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.fire(ApiRequest::delete(format!("/posts/{post_id}"))).await
    }

    // =========================================================================
    // SOCIAL
    // =========================================================================

    /// Comment on a post, or reply to `parent_id`.
    pub async fn create_comment(&self, post_id: i64, text: &str, parent_id: Option<i64>) -> Result<Value, ApiError> {
        let body = json!({ "post_id": post_id, "text": text, "parent_id": parent_id });
        self.fetch(ApiRequest::post("/social/comments").json_value(body)).await
    }

    pub async fn post_comments(&self, post_id: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/social/comments/post/{post_id}"))).await
    }

    pub async fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        self.fire(ApiRequest::delete(format!("/social/comments/{comment_id}"))).await
    }

    pub async fn like_post(&self, post_id: i64) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::post("/social/likes").json_value(json!({ "post_id": post_id }))).await
    }

    pub async fn unlike_post(&self, post_id: i64) -> Result<(), ApiError> {
        self.fire(ApiRequest::delete(format!("/social/likes/post/{post_id}"))).await
    }

    pub async fn post_likes(&self, post_id: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/social/likes/post/{post_id}"))).await
    }

    pub async fn follow(&self, user_id: i64) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::post("/social/follows").json_value(json!({ "following_id": user_id }))).await
    }

    pub async fn unfollow(&self, user_id: i64) -> Result<(), ApiError> {
        self.fire(ApiRequest::delete(format!("/social/follows/{user_id}"))).await
    }

    pub async fn followers(&self, user_id: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/social/followers/{user_id}"))).await
    }

    pub async fn following(&self, user_id: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/social/following/{user_id}"))).await
    }

    pub async fn create_story(&self, media: Upload, caption: Option<&str>) -> Result<Value, ApiError> {
        let mut parts = vec![media.into_part("file")];
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            parts.push(text("caption", caption));
        }
        self.fetch(ApiRequest::post("/social/stories").multipart(parts)).await
    }

    pub async fn stories(&self) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get("/social/stories")).await
    }

    pub async fn user_stories(&self, user_id: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/social/stories/user/{user_id}"))).await
    }

    pub async fn mark_story_viewed(&self, story_id: &str) -> Result<(), ApiError> {
        self.fire(ApiRequest::post(format!("/social/stories/{story_id}/view"))).await
    }

    pub async fn story_viewers(&self, story_id: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get(format!("/social/stories/{story_id}/views"))).await
    }

    pub async fn update_story(&self, story_id: &str, caption: &str) -> Result<Value, ApiError> {
        let request = ApiRequest::put(format!("/social/stories/{story_id}")).multipart(vec![text("caption", caption)]);
        self.fetch(request).await
    }

    pub async fn delete_story(&self, story_id: &str) -> Result<(), ApiError> {
        self.fire(ApiRequest::delete(format!("/social/stories/{story_id}"))).await
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    pub async fn notifications(&self, skip: u32, limit: u32) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get("/notifications/").query("skip", skip).query("limit", limit))
            .await
    }

    pub async fn unread_notifications(&self) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::get("/notifications/unread")).await
    }

    pub async fn unread_count(&self) -> Result<u64, ApiError> {
        let body: UnreadCount = self.send(ApiRequest::get("/notifications/unread/count")).await?.json()?;
        Ok(body.count)
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::put(format!("/notifications/{notification_id}/read"))).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<Value, ApiError> {
        self.fetch(ApiRequest::put("/notifications/read-all")).await
    }

    pub async fn delete_notification(&self, notification_id: &str) -> Result<(), ApiError> {
        self.fire(ApiRequest::delete(format!("/notifications/{notification_id}"))).await
    }

    pub async fn clear_notifications(&self) -> Result<(), ApiError> {
        self.fire(ApiRequest::delete("/notifications/clear-all")).await
    }
}
