use chronicle_core::SerializationError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("decode error for {type_path}: {detail}")]
    Decode {
        type_path: &'static str,
        detail: String,
    },

    #[error("unsupported criteria: {0}")]
    Translation(String),

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        table: &'static str,
        column: &'static str,
        detail: String,
    },

    #[error("IO error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<SerializationError> for StoreError {
    fn from(e: SerializationError) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
