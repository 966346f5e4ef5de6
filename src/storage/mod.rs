mod local;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use self::local::LocalPhotoStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file: {0}")]
    Unsupported(String),
}

/// Where a stored photo ended up. `url` is what clients fetch; `key` is
/// what `delete` needs later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    pub url: String,
    pub key: String,
}

/// Backing store for uploaded photos. The local disk implementation is the
/// default; swapping in an object store only means implementing this trait.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredPhoto, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

pub type DynPhotoStorage = Arc<dyn PhotoStorage>;
