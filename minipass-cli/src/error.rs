use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Notification error: {0}")]
    Notify(#[from] minipass_notify::NotifyError),

    #[error("Cache error: {0}")]
    Cache(#[from] minipass_cache::CacheError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),
}
