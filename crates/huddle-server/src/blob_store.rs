//! On-disk asset store for message attachments.
//!
//! Clients first ask for an upload URL, which embeds a one-shot ticket, then
//! POST the raw bytes to it and get back the asset id they attach to an image
//! message.  Files are named by their [`AssetId`], so no client-supplied text
//! ever reaches a path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use huddle_shared::constants::UPLOAD_TICKET_TTL_SECS;
use huddle_shared::AssetId;

use crate::error::ServerError;

#[derive(Debug)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
    public_base_url: String,
    ticket_ttl: Duration,
    /// Outstanding upload tickets and when they were issued.
    tickets: Mutex<HashMap<String, Instant>>,
}

impl BlobStore {
    pub async fn new(
        base_path: PathBuf,
        max_size: usize,
        public_base_url: String,
    ) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::AssetStorage(format!(
                "Failed to create asset directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Asset store initialized");

        Ok(Self {
            base_path,
            max_size,
            public_base_url,
            ticket_ttl: Duration::from_secs(UPLOAD_TICKET_TTL_SECS),
            tickets: Mutex::new(HashMap::new()),
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // ------------------------------------------------------------------
    // Upload tickets
    // ------------------------------------------------------------------

    /// Issue a ticket and return the URL the bytes must be posted to.
    pub async fn generate_upload_url(&self) -> String {
        let ticket = Uuid::new_v4().simple().to_string();
        self.tickets
            .lock()
            .await
            .insert(ticket.clone(), Instant::now());

        format!("{}/assets/upload/{}", self.public_base_url, ticket)
    }

    /// Consume a ticket.  Each ticket admits exactly one upload.
    pub async fn redeem_ticket(&self, ticket: &str) -> Result<(), ServerError> {
        let issued = self.tickets.lock().await.remove(ticket);
        match issued {
            Some(at) if at.elapsed() < self.ticket_ttl => Ok(()),
            _ => Err(ServerError::NotFound(
                "upload ticket is unknown or expired".to_string(),
            )),
        }
    }

    pub async fn purge_expired_tickets(&self) -> usize {
        let mut tickets = self.tickets.lock().await;
        let before = tickets.len();
        tickets.retain(|_, at| at.elapsed() < self.ticket_ttl);
        before - tickets.len()
    }

    // ------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------

    /// Reject an upload body that could never be stored.
    pub fn check_upload(&self, size: usize) -> Result<(), ServerError> {
        if size == 0 {
            return Err(ServerError::BadRequest("Empty upload".to_string()));
        }
        if size > self.max_size {
            return Err(ServerError::AssetTooLarge {
                size,
                max: self.max_size,
            });
        }
        Ok(())
    }

    pub async fn store_blob(&self, data: &[u8]) -> Result<AssetId, ServerError> {
        self.check_upload(data.len())?;

        let id = AssetId::new();
        fs::write(self.blob_path(&id), data).await.map_err(|e| {
            ServerError::AssetStorage(format!("Failed to write asset {}: {}", id, e))
        })?;

        debug!(id = %id, size = data.len(), "Stored asset");
        Ok(id)
    }

    pub async fn get_blob(&self, id: &AssetId) -> Result<Vec<u8>, ServerError> {
        let path = self.blob_path(id);

        if !self.exists(id).await {
            return Err(ServerError::AssetNotFound(*id));
        }

        let data = fs::read(&path).await.map_err(|e| {
            ServerError::AssetStorage(format!("Failed to read asset {}: {}", id, e))
        })?;

        debug!(id = %id, size = data.len(), "Retrieved asset");
        Ok(data)
    }

    /// Public URL of an asset, or `None` when nothing is stored under `id`.
    pub async fn download_url(&self, id: &AssetId) -> Option<String> {
        if self.exists(id).await {
            Some(format!("{}/assets/{}", self.public_base_url, id))
        } else {
            None
        }
    }

    async fn exists(&self, id: &AssetId) -> bool {
        fs::try_exists(self.blob_path(id)).await.unwrap_or(false)
    }

    fn blob_path(&self, id: &AssetId) -> PathBuf {
        self.base_path.join(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (BlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(
            dir.path().to_path_buf(),
            1024,
            "http://chat.test".to_string(),
        )
        .await
        .unwrap();
        (store, dir)
    }

    fn ticket_of(url: &str) -> &str {
        url.rsplit('/').next().unwrap()
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let (store, _dir) = test_store().await;
        let data = b"png-bytes";

        let id = store.store_blob(data).await.unwrap();
        assert_eq!(store.get_blob(&id).await.unwrap(), data);
        assert_eq!(
            store.download_url(&id).await,
            Some(format!("http://chat.test/assets/{id}"))
        );
    }

    #[tokio::test]
    async fn test_not_found() {
        let (store, _dir) = test_store().await;
        let missing = AssetId::new();
        assert!(matches!(
            store.get_blob(&missing).await,
            Err(ServerError::AssetNotFound(_))
        ));
        assert_eq!(store.download_url(&missing).await, None);
    }

    #[tokio::test]
    async fn test_size_limits() {
        let (store, _dir) = test_store().await;
        assert!(store.store_blob(b"").await.is_err());
        assert!(matches!(
            store.store_blob(&[0u8; 2048]).await,
            Err(ServerError::AssetTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_ticket_is_single_use() {
        let (store, _dir) = test_store().await;
        let url = store.generate_upload_url().await;
        assert!(url.starts_with("http://chat.test/assets/upload/"));

        let ticket = ticket_of(&url);
        store.redeem_ticket(ticket).await.unwrap();
        assert!(store.redeem_ticket(ticket).await.is_err());
        assert!(store.redeem_ticket("made-up").await.is_err());
    }

    #[tokio::test]
    async fn test_expired_tickets_are_purged() {
        let (mut store, _dir) = test_store().await;
        store.ticket_ttl = Duration::ZERO;

        let url = store.generate_upload_url().await;
        assert_eq!(store.purge_expired_tickets().await, 1);
        assert!(store.redeem_ticket(ticket_of(&url)).await.is_err());
    }
}
