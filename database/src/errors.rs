use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("bincode encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored key or value does not decode to what its column family holds
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("column family not found: {0}")]
    ColumnFamilyNotFound(String),

    #[error("database is closed")]
    DatabaseClosed,
}

pub type DbResult<T> = Result<T, DbError>;
