//! Open signatures.
//!
//! A signature is produced by an application supplied [`SignatureFactory`]
//! and may be cached per peer. Each call site decides whether to read and
//! write that cache; the automatic re-login path does neither because the
//! session token takes over once a session has been opened.

use crate::store::error::StoreError;
use crate::store::traits::SignatureStore;
use crate::types::signature::Signature;
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature factory failed: code={code}, {message}")]
    Factory { code: i32, message: String },
    #[error("signature store error: {0}")]
    Store(#[from] StoreError),
    #[error("signature task did not complete: {0}")]
    Task(String),
}

/// Computes the signature that authorises `peer_id` to open a session.
#[async_trait]
pub trait SignatureFactory: Send + Sync {
    async fn create_signature(
        &self,
        peer_id: &str,
        watch_peer_ids: &[String],
    ) -> Result<Signature, SignatureError>;
}

/// Whether a signature request may use and populate the signature cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignaturePolicy {
    pub use_cache: bool,
    pub cache_result: bool,
}

impl SignaturePolicy {
    /// Explicit logins reuse and refresh cached signatures.
    pub const CACHED: Self = Self {
        use_cache: true,
        cache_result: true,
    };

    /// Automatic re-login after a reconnect always computes afresh.
    pub const AUTO_LOGIN: Self = Self {
        use_cache: false,
        cache_result: false,
    };
}

pub struct SignatureProvider {
    factory: Option<Arc<dyn SignatureFactory>>,
    store: Arc<dyn SignatureStore>,
}

impl SignatureProvider {
    pub fn new(factory: Option<Arc<dyn SignatureFactory>>, store: Arc<dyn SignatureStore>) -> Self {
        Self { factory, store }
    }

    /// Returns a usable signature, or `None` when no factory is configured.
    ///
    /// An expired cached signature is treated as absent.
    pub async fn fetch(
        &self,
        peer_id: &str,
        policy: SignaturePolicy,
    ) -> Result<Option<Signature>, SignatureError> {
        if policy.use_cache {
            match self.store.get_signature(peer_id).await {
                Ok(Some(sig)) if !sig.is_expired() => {
                    debug!(target: "Session/Signature", "Using cached signature for {peer_id}");
                    return Ok(Some(sig));
                }
                Ok(Some(_)) => {
                    debug!(target: "Session/Signature", "Cached signature for {peer_id} expired");
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target: "Session/Signature", "Failed to read cached signature for {peer_id}: {e}");
                }
            }
        }

        let Some(factory) = &self.factory else {
            debug!(target: "Session/Signature", "No signature factory configured for {peer_id}");
            return Ok(None);
        };

        let signature = factory.create_signature(peer_id, &[]).await?;
        if policy.cache_result {
            if let Err(e) = self.store.put_signature(peer_id, signature.clone()).await {
                warn!(target: "Session/Signature", "Failed to cache signature for {peer_id}: {e}");
            }
        }
        Ok(Some(signature))
    }

    /// Runs [`fetch`](Self::fetch) on a separate task so the caller's context
    /// is never blocked on signature computation.
    pub fn spawn_fetch(
        self: &Arc<Self>,
        peer_id: String,
        policy: SignaturePolicy,
    ) -> JoinHandle<Result<Option<Signature>, SignatureError>> {
        let provider = self.clone();
        tokio::spawn(async move { provider.fetch(&peer_id, policy).await })
    }
}
