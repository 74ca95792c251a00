//! # photofeed client
//!
//! Session core for the photofeed social client: token persistence, the
//! authenticated request pipeline with silent refresh, the per-tab session
//! controller, and cross-tab session sync. Typed wrappers for the resource
//! endpoints (users, posts, social, notifications) sit on top of the pipeline.
//!
//! Native builds talk to the backend through `reqwest`. The `hydrate`
//! feature adds browser bindings (`localStorage`, `storage` events,
//! `window.location`, `gloo-net`) for wasm32 targets.

pub mod config;
pub mod error;
pub mod net;
pub mod state;
pub mod util;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::ClientConfig;
pub use error::{ApiError, SessionError, StoreError};
pub use net::api::Api;
pub use net::pipeline::AuthPipeline;
pub use net::types::{Credentials, UserRecord};
pub use state::notifications::UnreadCounter;
pub use state::session::{Session, SessionController, SessionPhase};
pub use state::sync::CrossTabSync;
pub use state::tokens::TokenStore;
