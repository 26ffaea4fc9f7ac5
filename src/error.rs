//! Error type shared by the invoice library.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvoiceError {
    /// The order payload could not be interpreted at all (e.g. not an object).
    #[error("invalid order payload: {0}")]
    InvalidOrder(String),

    /// Remote order API failure, already mapped to a user-facing message.
    #[error("{0}")]
    Api(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("logo: {0}")]
    Logo(String),

    #[error("preference store: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("preference store lock poisoned")]
    StoreLocked,

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InvoiceError>;
