//! Client session state.
//!
//! SYSTEM CONTEXT
//! ==============
//! `tokens` persists the credential pair shared by every tab, `session` owns
//! one tab's view of the signed-in user, `sync` keeps that view consistent
//! with changes made by other tabs, and `notifications` derives the unread
//! badge from the session.

#[cfg(all(feature = "hydrate", target_arch = "wasm32"))]
pub mod browser;
pub mod notifications;
pub mod session;
pub mod sync;
pub mod tokens;
