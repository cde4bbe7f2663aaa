//! Per-frame handlers of the session listener.
//!
//! Each file adds an `impl SessionListener` block for one family of frames.

pub mod ack;
pub mod conversation;
pub mod error;
pub mod message;
pub mod patch;
pub mod receipt;
pub mod session;
pub mod unread;
