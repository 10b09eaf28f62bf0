use thiserror::Error;

/// Failures of the spreadsheet mirror.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Connection settings (sheet id, service account) are missing.
    #[error("{0}")]
    Config(String),

    #[error("row must be a positive integer, got {0}")]
    InvalidRow(String),

    #[error("tab '{0}' not found in spreadsheet")]
    TabNotFound(String),

    /// The service answered with an error; `message` is its own text when it sent one.
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("appended row could not be located in tab '{0}'")]
    RowNotLocated(String),

    #[error("service account authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Failures of the authoritative record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entry {0} not found")]
    NotFound(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store data is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Fatal failure of a coordinated create/edit/delete.
///
/// Only the store can abort an operation; mirror failures are reported
/// through `MirrorStatus` instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SheetResult<T> = Result<T, SheetError>;
pub type StoreResult<T> = Result<T, StoreError>;
