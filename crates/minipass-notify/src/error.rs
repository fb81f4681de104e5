use reqwest::StatusCode;

/// Custom error type for notification channel operations
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Server returned status code {0}")]
    StatusCode(StatusCode),

    #[error("Malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Invalid push key material: {0}")]
    PushKey(String),
}
