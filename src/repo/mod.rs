// Repository pattern - isolates all database side effects
pub mod likes;
pub mod messages;
pub mod photos;
pub mod users;

pub use likes::{DynLikeRepository, LikePredicate, LikeRepository, SqliteLikeRepository};
pub use messages::{
    DynMessageRepository, MessageContainer, MessageRepository, SqliteMessageRepository,
};
pub use photos::{DynPhotoRepository, PhotoRepository, SqlitePhotoRepository};
pub use users::{
    DynUserRepository, MemberFilter, MemberOrder, NewUser, SqliteUserRepository, UserRepository,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}
