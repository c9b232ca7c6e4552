use errors::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("not found")]
    NotFound
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => CoreError::not_found("the requested resource"),
            StorageError::Database(e) => CoreError::internal(e.to_string())
        }
    }
}
