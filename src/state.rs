use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::repo::{
    DynLikeRepository, DynMessageRepository, DynPhotoRepository, DynUserRepository,
    SqliteLikeRepository, SqliteMessageRepository, SqlitePhotoRepository, SqliteUserRepository,
};
use crate::storage::DynPhotoStorage;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared application state, cheap to clone into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub users: DynUserRepository,
    pub likes: DynLikeRepository,
    pub messages: DynMessageRepository,
    pub photos: DynPhotoRepository,
    pub photo_storage: DynPhotoStorage,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, photo_storage: DynPhotoStorage) -> Self {
        Self {
            users: Arc::new(SqliteUserRepository::new(db.clone())),
            likes: Arc::new(SqliteLikeRepository::new(db.clone())),
            messages: Arc::new(SqliteMessageRepository::new(db.clone())),
            photos: Arc::new(SqlitePhotoRepository::new(db.clone())),
            db,
            config,
            photo_storage,
        }
    }
}
