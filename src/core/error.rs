use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Parsing error: {0}")]
    Parsing(String),

    #[error("Not a directory or does not exist: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("A scan is already in progress")]
    ScanInProgress,
}

pub type Result<T> = std::result::Result<T, Error>;

macro_rules! database_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for Error {
                fn from(e: $source) -> Self {
                    Error::Database(e.to_string())
                }
            }
        )*
    };
}

database_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Database(format!("Failed to (de)serialize record: {}", e))
    }
}
