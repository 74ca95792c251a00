//! Authenticated request pipeline with bounded silent re-authentication.
//!
//! ARCHITECTURE
//! ============
//! `AuthPipeline` decorates an `HttpTransport`:
//!
//! 1. attach `Authorization: Bearer <token>` when an access token is stored;
//! 2. on a 401 from anything but the login/register endpoints, spend the
//!    call's single refresh attempt (`POST /users/refresh`), store the new
//!    token, and re-issue the call once with it;
//! 3. when no refresh token exists or the refresh is rejected, clear the
//!    token store, redirect to the login view (unless already there), fire
//!    the session-expired hook, and fail with `ApiError::SessionExpired`.
//!
//! Every other status is returned untouched; callers decode it.
//!
//! TRADE-OFFS
//! ==========
//! Concurrent 401s each run their own refresh. Refresh is idempotent on the
//! backend and the token store is last-writer-wins, so this costs extra
//! round-trips but never correctness.

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ApiError;
use crate::state::tokens::TokenStore;
use crate::util::redirect::{Navigator, redirect_to_login};

use super::request::{ApiRequest, ApiResponse};
use super::transport::HttpTransport;
use super::types::{RefreshGrant, RefreshRequest};

pub const LOGIN_ENDPOINT: &str = "/users/login";
pub const REGISTER_ENDPOINT: &str = "/users/register";
pub const REFRESH_ENDPOINT: &str = "/users/refresh";

type ExpiryHook = Arc<dyn Fn() + Send + Sync>;

/// Whether `route` is one of the credential-issuing endpoints, whose 401s
/// mean "wrong credentials" rather than "expired token".
#[must_use]
pub fn is_auth_endpoint(route: &str) -> bool {
    route == LOGIN_ENDPOINT || route == REGISTER_ENDPOINT
}

/// Why a refresh attempt could not produce a new access token.
#[derive(Debug)]
enum RefreshFailure {
    Missing,
    Rejected(ApiError),
}

pub struct AuthPipeline {
    transport: Arc<dyn HttpTransport>,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    on_expired: Mutex<Option<ExpiryHook>>,
}

impl AuthPipeline {
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: TokenStore,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self { transport, tokens, navigator, login_path: login_path.into(), on_expired: Mutex::new(None) }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Register the callback run after the pipeline ends a session.
    pub fn on_session_expired<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_expired.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Send `request` with stored credentials, renewing them at most once.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` on transport failure, or
    /// `ApiError::SessionExpired` when a 401 could not be recovered.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if !request.retried {
            request.bearer = self.tokens.access_token()?;
        }

        loop {
            let response = self.transport.send(&request).await?;
            if response.status != 401 {
                return Ok(response);
            }
            if is_auth_endpoint(request.route()) {
                tracing::debug!(path = %request.path, "credentials rejected; not refreshing");
                return Ok(response);
            }
            if request.retried {
                tracing::warn!(path = %request.path, "401 after token refresh; giving up");
                return Ok(response);
            }
            request.retried = true;

            match self.refresh().await {
                Ok(access_token) => request.bearer = Some(access_token),
                Err(failure) => {
                    self.end_session(&failure);
                    return Err(ApiError::SessionExpired);
                }
            }
        }
    }

    async fn refresh(&self) -> Result<String, RefreshFailure> {
        let refresh_token = match self.tokens.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => return Err(RefreshFailure::Missing),
            Err(e) => return Err(RefreshFailure::Rejected(e.into())),
        };

        let request = ApiRequest::post(REFRESH_ENDPOINT)
            .json(&RefreshRequest { refresh_token: &refresh_token })
            .map_err(RefreshFailure::Rejected)?;
        let grant: RefreshGrant = self
            .transport
            .send(&request)
            .await
            .and_then(ApiResponse::json)
            .map_err(RefreshFailure::Rejected)?;

        self.tokens
            .store_refreshed(&grant.access_token, grant.refresh_token.as_deref())
            .map_err(|e| RefreshFailure::Rejected(e.into()))?;
        tracing::debug!(rotated = grant.refresh_token.is_some(), "access token refreshed");
        Ok(grant.access_token)
    }

    fn end_session(&self, failure: &RefreshFailure) {
        match failure {
            RefreshFailure::Missing => tracing::info!("no refresh token; ending session"),
            RefreshFailure::Rejected(e) => tracing::warn!(error = %e, "token refresh failed; ending session"),
        }
        if let Err(e) = self.tokens.clear() {
            tracing::error!(error = %e, "failed to clear token store");
        }
        redirect_to_login(self.navigator.as_ref(), &self.login_path);

        let hook = self.on_expired.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}
