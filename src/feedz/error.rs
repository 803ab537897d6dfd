use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedzError {
    #[error("Item not found: {0}")]
    NotFound(u64),

    #[error("Item {0} is busy, retry shortly")]
    Busy(u64),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),
}

impl FeedzError {
    /// Transient contention: the caller may retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedzError::Busy(_))
    }
}

pub type Result<T> = std::result::Result<T, FeedzError>;
