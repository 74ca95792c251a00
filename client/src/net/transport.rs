//! HTTP transport seam.
//!
//! The pipeline only needs "send this request, give me status + body".
//! Native builds use `reqwest`; the browser build supplies a `gloo-net`
//! implementation in `net::browser`. Tests script responses through a mock.

use crate::error::ApiError;

use super::request::{ApiRequest, ApiResponse};

/// Sends one request and returns whatever status the backend produced.
///
/// Implementations must not interpret statuses: a 401 is an `Ok` response.
/// `Err` is reserved for transport failures (DNS, refused, timeout, ...).
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

// =============================================================================
// REQWEST
// =============================================================================

#[cfg(feature = "native")]
pub use native::ReqwestTransport;

#[cfg(feature = "native")]
mod native {
    use std::time::Duration;

    use reqwest::header::AUTHORIZATION;
    use reqwest::multipart;

    use crate::config::ClientConfig;
    use crate::error::ApiError;
    use crate::net::request::{ApiRequest, ApiResponse, Method, Part, RequestBody};

    use super::HttpTransport;

    /// `reqwest`-backed transport rooted at the configured API base URL.
    pub struct ReqwestTransport {
        http: reqwest::Client,
        config: ClientConfig,
    }

    impl ReqwestTransport {
        /// Build a transport with the configured request/connect timeouts.
        ///
        /// # Errors
        ///
        /// Returns an error if the HTTP client fails to build.
        pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
                .build()
                .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
            Ok(Self { http, config })
        }

        fn build(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder, ApiError> {
            let url = self.config.endpoint(&request.path);
            let mut builder = match request.method {
                Method::Get => self.http.get(&url),
                Method::Post => self.http.post(&url),
                Method::Put => self.http.put(&url),
                Method::Patch => self.http.patch(&url),
                Method::Delete => self.http.delete(&url),
            };
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(value) = request.authorization() {
                builder = builder.header(AUTHORIZATION, value);
            }
            builder = match &request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => builder.json(value),
                RequestBody::Form(fields) => builder.form(fields),
                RequestBody::Multipart(parts) => builder.multipart(multipart_form(parts)?),
            };
            Ok(builder)
        }
    }

    fn multipart_form(parts: &[Part]) -> Result<multipart::Form, ApiError> {
        let mut form = multipart::Form::new();
        for part in parts {
            form = match part {
                Part::Text { name, value } => form.text(name.clone(), value.clone()),
                Part::File { name, file_name, mime, bytes } => {
                    let file = multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(mime)
                        .map_err(|e| ApiError::Decode(format!("invalid mime type {mime}: {e}")))?;
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }

    #[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
    #[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
            let response = self
                .build(request)?
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
            tracing::debug!(method = request.method.as_str(), path = %request.path, status, "api call");
            Ok(ApiResponse { status, body })
        }
    }
}
