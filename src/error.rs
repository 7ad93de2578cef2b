use thiserror::Error;

/// Failures of the candidate store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("candidate has no id; add it before updating it")]
    MissingId,

    #[error("Database not initialized. Run 'candidates init' first.")]
    NotInitialized,
}

/// Failures of the candidate source.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {url}: {details}")]
    Payload { url: String, details: String },
}

/// Anything an operation touching both the source and the store can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}
