use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{PhotoStorage, StorageError, StoredPhoto};

/// Stores photos as flat files under one directory, served back at
/// `/uploads/{key}`.
pub struct LocalPhotoStorage {
    root: PathBuf,
}

impl LocalPhotoStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn extension_of(filename: &str) -> String {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "jpg".to_string())
    }
}

#[async_trait]
impl PhotoStorage for LocalPhotoStorage {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredPhoto, StorageError> {
        let key = format!(
            "{}.{}",
            uuid::Uuid::now_v7(),
            Self::extension_of(filename)
        );

        fs::create_dir_all(&self.root).await?;
        fs::write(self.root.join(&key), bytes).await?;

        Ok(StoredPhoto {
            url: format!("/uploads/{key}"),
            key,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // Keys are generated server-side, but never follow one outside the root.
        if key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(StorageError::Unsupported(format!("invalid key: {key}")));
        }

        match fs::remove_file(self.root.join(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
