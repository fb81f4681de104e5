/// Custom error type for asset cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Network unreachable: {0}")]
    Unreachable(String),
}
