use std::path::PathBuf;

use common::CatalogId;
use metadata::MetadataError;
use redb::{CommitError, DatabaseError, StorageError, TableError, TransactionError};

use crate::config::ConfigError;

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Metadata(MetadataError),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
    Config(ConfigError),
    KeyParse(String),
    VersionMismatch(u32),
    IdOverflow(u64),
    InvalidPath(String),
    PathConflict { path: String, existing: CatalogId },
    RootUnreadable(PathBuf),
    DuplicatePath(String),
    CatalogNotFound(CatalogId),
    CatalogBusy(CatalogId),
    UnknownCharset(String),
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(err) => write!(f, "io error: {}", err),
            CatalogError::Metadata(err) => write!(f, "metadata error: {}", err),
            CatalogError::Redb(err) => write!(f, "db error: {}", err),
            CatalogError::Bincode(err) => write!(f, "bincode error: {}", err),
            CatalogError::Config(err) => write!(f, "config error: {}", err),
            CatalogError::KeyParse(value) => write!(f, "key parse error: {}", value),
            CatalogError::VersionMismatch(version) => {
                write!(f, "index version mismatch: {}", version)
            }
            CatalogError::IdOverflow(next) => write!(f, "id {} is out of range", next),
            CatalogError::InvalidPath(path) => write!(f, "invalid catalog path: {:?}", path),
            CatalogError::PathConflict { path, existing } => write!(
                f,
                "path {:?} overlaps the root of existing catalog {}",
                path, existing
            ),
            CatalogError::RootUnreadable(path) => {
                write!(f, "catalog root {} can not be read", path.display())
            }
            CatalogError::DuplicatePath(path) => write!(f, "path already indexed: {}", path),
            CatalogError::CatalogNotFound(id) => write!(f, "catalog {} not found", id),
            CatalogError::CatalogBusy(id) => {
                write!(f, "catalog {} is already being processed", id)
            }
            CatalogError::UnknownCharset(label) => write!(f, "unknown charset: {}", label),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err)
    }
}

impl From<MetadataError> for CatalogError {
    fn from(err: MetadataError) -> Self {
        CatalogError::Metadata(err)
    }
}

impl From<ConfigError> for CatalogError {
    fn from(err: ConfigError) -> Self {
        CatalogError::Config(err)
    }
}

impl From<redb::Error> for CatalogError {
    fn from(err: redb::Error) -> Self {
        CatalogError::Redb(err)
    }
}

impl From<DatabaseError> for CatalogError {
    fn from(err: DatabaseError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<TableError> for CatalogError {
    fn from(err: TableError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<TransactionError> for CatalogError {
    fn from(err: TransactionError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<StorageError> for CatalogError {
    fn from(err: StorageError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<CommitError> for CatalogError {
    fn from(err: CommitError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for CatalogError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        CatalogError::Bincode(err)
    }
}
