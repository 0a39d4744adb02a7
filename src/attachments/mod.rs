/// Attachment storage
///
/// The core persists only the stable reference returned by the store;
/// raw bytes never touch the ticket tables.
use crate::error::{DeskError, DeskResult};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// Reference to a stored file
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Stable path/URL persisted on the attachment record
    pub reference: String,
    pub size: i64,
}

/// Pluggable attachment storage backend
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store raw file bytes and return a stable reference
    async fn put(&self, data: Vec<u8>, file_name: &str) -> DeskResult<StoredFile>;

    /// Fetch previously stored bytes by reference
    async fn get(&self, reference: &str) -> DeskResult<Vec<u8>>;
}

/// Disk storage backend
///
/// Stores files on the local filesystem with directory sharding based on
/// a random key prefix to prevent too many files in one directory.
#[derive(Clone)]
pub struct DiskAttachmentStore {
    base_path: PathBuf,
}

impl DiskAttachmentStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Relative reference for a fresh upload: {shard}/{key}_{name}
    fn make_reference(file_name: &str) -> String {
        let key = Uuid::new_v4().simple().to_string();
        let shard = &key[0..2];
        // Keep only a safe subset of the original name
        let safe_name: String = file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}/{}_{}", shard, key, safe_name)
    }
}

#[async_trait]
impl AttachmentStore for DiskAttachmentStore {
    async fn put(&self, data: Vec<u8>, file_name: &str) -> DeskResult<StoredFile> {
        let reference = Self::make_reference(file_name);
        let path = self.base_path.join(&reference);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DeskError::Internal(format!("Failed to create attachment directory: {}", e))
            })?;
        }

        let size = data.len() as i64;
        fs::write(&path, data)
            .await
            .map_err(|e| DeskError::Internal(format!("Failed to write attachment: {}", e)))?;

        Ok(StoredFile { reference, size })
    }

    async fn get(&self, reference: &str) -> DeskResult<Vec<u8>> {
        let path = self.base_path.join(reference);
        fs::read(&path)
            .await
            .map_err(|_| DeskError::NotFound(format!("Attachment {} not found", reference)))
    }
}
