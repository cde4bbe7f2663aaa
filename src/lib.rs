// Wire vocabulary and error types live in imcore.
pub use imcore::{error, protocol};

// Event payloads come from imcore; the EventBus that carries them lives here.
pub mod types {
    pub use imcore::types::*;
    pub use imcore::{operation, signature};
    pub mod events;
}

pub mod client;
pub mod config;
pub mod conversation;
pub mod depot;
pub mod handlers;
pub mod listener;
pub mod operation_cache;
pub mod pending;
pub mod receipt_cache;
pub mod request;
pub mod send;
pub mod session;
pub mod signature;
pub mod store;
pub mod transport;

pub mod test_utils;

pub use client::{Client, ClientError};
pub use config::ClientConfig;
pub use listener::SessionListener;
