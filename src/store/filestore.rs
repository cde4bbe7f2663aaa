use crate::store::error::{Result, StoreError};
use crate::store::traits::*;
use crate::types::signature::{SessionToken, Signature};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// JSON-file backend, one file per key under a directory per store.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub async fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let base_path = path.into();
        let store = Self { base_path };

        fs::create_dir_all(store.path_for("tokens")).await?;
        fs::create_dir_all(store.path_for("signatures")).await?;
        fs::create_dir_all(store.path_for("tags")).await?;
        fs::create_dir_all(store.path_for("depot")).await?;

        Ok(store)
    }

    fn path_for(&self, sub: &str) -> PathBuf {
        self.base_path.join(sub)
    }

    fn file_for(&self, sub: &str, key: &str) -> PathBuf {
        self.path_for(sub)
            .join(format!("{}.json", Self::sanitize_filename(key)))
    }

    fn sanitize_filename(key: &str) -> String {
        key.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-', "_")
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read(path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(path, data).await.map_err(StoreError::Io)
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[async_trait]
impl TokenStore for FileStore {
    async fn get_session_token(&self, peer_id: &str) -> Result<Option<SessionToken>> {
        let token: Option<SessionToken> = self.read_json(&self.file_for("tokens", peer_id)).await?;
        Ok(token.filter(SessionToken::is_valid))
    }

    async fn put_session_token(&self, peer_id: &str, token: SessionToken) -> Result<()> {
        self.write_json(&self.file_for("tokens", peer_id), &token)
            .await
    }

    async fn remove_session_token(&self, peer_id: &str) -> Result<()> {
        self.remove_file(&self.file_for("tokens", peer_id)).await
    }
}

#[async_trait]
impl SignatureStore for FileStore {
    async fn get_signature(&self, peer_id: &str) -> Result<Option<Signature>> {
        self.read_json(&self.file_for("signatures", peer_id)).await
    }

    async fn put_signature(&self, peer_id: &str, signature: Signature) -> Result<()> {
        self.write_json(&self.file_for("signatures", peer_id), &signature)
            .await
    }

    async fn remove_signature(&self, peer_id: &str) -> Result<()> {
        self.remove_file(&self.file_for("signatures", peer_id)).await
    }
}

#[async_trait]
impl TagStore for FileStore {
    async fn get_session_tag(&self, peer_id: &str) -> Result<Option<String>> {
        self.read_json(&self.file_for("tags", peer_id)).await
    }

    async fn put_session_tag(&self, peer_id: &str, tag: &str) -> Result<()> {
        self.write_json(&self.file_for("tags", peer_id), &tag).await
    }

    async fn remove_session_tag(&self, peer_id: &str) -> Result<()> {
        self.remove_file(&self.file_for("tags", peer_id)).await
    }
}

#[async_trait]
impl DepotStore for FileStore {
    async fn load_depot(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .read_json(&self.file_for("depot", key))
            .await?
            .unwrap_or_default())
    }

    async fn save_depot(&self, key: &str, message_ids: &[String]) -> Result<()> {
        self.write_json(&self.file_for("depot", key), &message_ids)
            .await
    }
}
