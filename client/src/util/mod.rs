//! Utility helpers shared across client modules.
//!
//! SYSTEM CONTEXT
//! ==============
//! Utility modules isolate environment concerns (navigation, media hosting)
//! from session and request logic.

pub mod media;
pub mod redirect;
