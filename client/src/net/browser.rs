//! `gloo-net` transport for the browser build.
//!
//! Bodies are rebuilt from the request value on every send: form fields as
//! `URLSearchParams`, uploads as `FormData` with one `Blob` per file.

use gloo_net::http::{Request, RequestBuilder};
use wasm_bindgen::JsValue;
use web_sys::{Blob, BlobPropertyBag, FormData, UrlSearchParams};

use crate::config::ClientConfig;
use crate::error::ApiError;

use super::request::{ApiRequest, ApiResponse, Method, Part, RequestBody};
use super::transport::HttpTransport;

fn js_error(context: &str, value: &JsValue) -> ApiError {
    ApiError::Network(format!("{context}: {value:?}"))
}

pub struct GlooTransport {
    config: ClientConfig,
}

impl GlooTransport {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    fn builder(&self, request: &ApiRequest) -> RequestBuilder {
        let url = self.config.endpoint(&request.path);
        let mut builder = match request.method {
            Method::Get => Request::get(&url),
            Method::Post => Request::post(&url),
            Method::Put => Request::put(&url),
            Method::Patch => Request::patch(&url),
            Method::Delete => Request::delete(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        if let Some(value) = request.authorization() {
            builder = builder.header("Authorization", &value);
        }
        builder
    }

    fn build(&self, request: &ApiRequest) -> Result<Request, ApiError> {
        let builder = self.builder(request);
        let built = match &request.body {
            RequestBody::Empty => builder.build(),
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => {
                let params = UrlSearchParams::new().map_err(|e| js_error("URLSearchParams", &e))?;
                for (name, value) in fields {
                    params.append(name, value);
                }
                builder
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .body(String::from(params.to_string()))
            }
            RequestBody::Multipart(parts) => builder.body(form_data(parts)?),
        };
        built.map_err(|e| ApiError::Network(e.to_string()))
    }
}

fn form_data(parts: &[Part]) -> Result<FormData, ApiError> {
    let form = FormData::new().map_err(|e| js_error("FormData", &e))?;
    for part in parts {
        match part {
            Part::Text { name, value } => {
                form.append_with_str(name, value).map_err(|e| js_error("FormData.append", &e))?;
            }
            Part::File { name, file_name, mime, bytes } => {
                let chunks = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes.as_slice()));
                let options = BlobPropertyBag::new();
                options.set_type(mime);
                let blob = Blob::new_with_u8_array_sequence_and_options(&chunks, &options)
                    .map_err(|e| js_error("Blob", &e))?;
                form.append_with_blob_and_filename(name, &blob, file_name)
                    .map_err(|e| js_error("FormData.append", &e))?;
            }
        }
    }
    Ok(form)
}

#[async_trait::async_trait(?Send)]
impl HttpTransport for GlooTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.build(request)?.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
        tracing::debug!(method = request.method.as_str(), path = %request.path, status, "api call");
        Ok(ApiResponse { status, body })
    }
}
