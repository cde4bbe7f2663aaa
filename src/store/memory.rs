use crate::store::error::Result;
use crate::store::generic::KeyedMemoryStore;
use crate::store::traits::*;
use crate::types::signature::{SessionToken, Signature};
use async_trait::async_trait;

type TokenMap = KeyedMemoryStore<SessionToken>;
type SignatureMap = KeyedMemoryStore<Signature>;
type TagMap = KeyedMemoryStore<String>;
type DepotMap = KeyedMemoryStore<Vec<String>>;

/// Volatile backend for tests and short-lived clients.
pub struct MemoryStore {
    tokens: TokenMap,
    signatures: SignatureMap,
    tags: TagMap,
    depots: DepotMap,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tokens: TokenMap::new(),
            signatures: SignatureMap::new(),
            tags: TagMap::new(),
            depots: DepotMap::new(),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get_session_token(&self, peer_id: &str) -> Result<Option<SessionToken>> {
        Ok(self.tokens.get_if(peer_id, SessionToken::is_valid).await)
    }

    async fn put_session_token(&self, peer_id: &str, token: SessionToken) -> Result<()> {
        self.tokens.put(peer_id, token).await;
        Ok(())
    }

    async fn remove_session_token(&self, peer_id: &str) -> Result<()> {
        self.tokens.remove(peer_id).await;
        Ok(())
    }
}

#[async_trait]
impl SignatureStore for MemoryStore {
    async fn get_signature(&self, peer_id: &str) -> Result<Option<Signature>> {
        Ok(self.signatures.get(peer_id).await)
    }

    async fn put_signature(&self, peer_id: &str, signature: Signature) -> Result<()> {
        self.signatures.put(peer_id, signature).await;
        Ok(())
    }

    async fn remove_signature(&self, peer_id: &str) -> Result<()> {
        self.signatures.remove(peer_id).await;
        Ok(())
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn get_session_tag(&self, peer_id: &str) -> Result<Option<String>> {
        Ok(self.tags.get(peer_id).await)
    }

    async fn put_session_tag(&self, peer_id: &str, tag: &str) -> Result<()> {
        self.tags.put(peer_id, tag.to_string()).await;
        Ok(())
    }

    async fn remove_session_tag(&self, peer_id: &str) -> Result<()> {
        self.tags.remove(peer_id).await;
        Ok(())
    }
}

#[async_trait]
impl DepotStore for MemoryStore {
    async fn load_depot(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.depots.get(key).await.unwrap_or_default())
    }

    async fn save_depot(&self, key: &str, message_ids: &[String]) -> Result<()> {
        self.depots.put(key, message_ids.to_vec()).await;
        Ok(())
    }
}
