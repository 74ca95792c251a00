//! Networking modules for the photofeed REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `request` and `types` define transport-neutral request values and the
//! wire schema, `transport` is the HTTP seam, `pipeline` adds credential
//! attachment and silent refresh on top of it, and `api` exposes the typed
//! endpoints that session and feature code call.

pub mod api;
#[cfg(all(feature = "hydrate", target_arch = "wasm32"))]
pub mod browser;
pub mod pipeline;
pub mod request;
pub mod transport;
pub mod types;
