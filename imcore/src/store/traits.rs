//! Key-value stores the session layer consumes.
//!
//! Every store is keyed by the local peer id, so one backend can serve many
//! sessions in the same process.

use crate::signature::{SessionToken, Signature};
use crate::store::error::Result;
use async_trait::async_trait;

/// Peer id -> session token issued by the server.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_session_token(&self, peer_id: &str) -> Result<Option<SessionToken>>;
    async fn put_session_token(&self, peer_id: &str, token: SessionToken) -> Result<()>;
    async fn remove_session_token(&self, peer_id: &str) -> Result<()>;
}

/// Peer id -> last computed open signature.
#[async_trait]
pub trait SignatureStore: Send + Sync {
    async fn get_signature(&self, peer_id: &str) -> Result<Option<Signature>>;
    async fn put_signature(&self, peer_id: &str, signature: Signature) -> Result<()>;
    async fn remove_signature(&self, peer_id: &str) -> Result<()>;
}

/// Peer id -> device tag the session was opened with.
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn get_session_tag(&self, peer_id: &str) -> Result<Option<String>>;
    async fn put_session_tag(&self, peer_id: &str, tag: &str) -> Result<()>;
    async fn remove_session_tag(&self, peer_id: &str) -> Result<()>;
}

/// Depot key -> message ids already delivered, oldest first.
#[async_trait]
pub trait DepotStore: Send + Sync {
    async fn load_depot(&self, key: &str) -> Result<Vec<String>>;
    async fn save_depot(&self, key: &str, message_ids: &[String]) -> Result<()>;
}

pub trait Backend: TokenStore + SignatureStore + TagStore + DepotStore + Send + Sync {}

impl<T> Backend for T where T: TokenStore + SignatureStore + TagStore + DepotStore + Send + Sync {}
