//! Shared types for the relink reconnection core
//!
//! This crate provides the vocabulary used across relink: who is being
//! reconnected, where to, and what the proxy tells them along the way.
//! It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`SessionId`] - Stable identity of a connected client
//! - [`BackendTarget`] - A backend server (name + address)
//! - [`ProxyMessage`] - Messages the proxy sends or disconnects with
//! - [`translate_color_codes`], [`strip_color`] - Legacy colour markup
//! - [`chat_to_plain`] - Flatten a JSON chat component to plain text
//! - [`RelinkError`] - Error types

pub mod chat;
pub mod error;
pub mod message;
pub mod session;
pub mod target;
pub mod text;

// Re-export commonly used types
pub use chat::*;
pub use error::*;
pub use message::*;
pub use session::*;
pub use target::*;
pub use text::*;
