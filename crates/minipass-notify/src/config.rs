use std::time::Duration;

use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("minipass-client/", env!("CARGO_PKG_VERSION"));

/// Configurable options for the notification engine
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Base URL of the Minipass server
    pub base_url: Url,

    /// Path of the event-stream endpoint
    pub stream_path: String,

    /// Maximum number of simultaneously displayed notifications
    pub max_visible: usize,

    /// Auto-dismiss delay for non-persistent notifications
    pub auto_dismiss: Duration,

    /// Initial reconnect backoff
    pub base_backoff: Duration,

    /// Upper bound on the reconnect backoff
    pub max_backoff: Duration,

    /// Reconnect attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl NotifyConfig {
    /// Create a configuration with the dashboard defaults for the given server
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            stream_path: "/api/event-stream".to_string(),
            max_visible: 5,
            auto_dismiss: Duration::from_secs(10),
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30_000),
            max_reconnect_attempts: 5,
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    pub fn builder(base_url: Url) -> NotifyConfigBuilder {
        NotifyConfigBuilder::new(base_url)
    }

    /// Resolve the event-stream URL against the base
    pub fn stream_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(&self.stream_path)
    }
}

/// Builder for creating [`NotifyConfig`] instances with a fluent API
#[derive(Debug, Clone)]
pub struct NotifyConfigBuilder {
    config: NotifyConfig,
}

impl NotifyConfigBuilder {
    pub fn new(base_url: Url) -> Self {
        Self {
            config: NotifyConfig::new(base_url),
        }
    }

    /// Set the event-stream endpoint path
    pub fn with_stream_path(mut self, path: impl Into<String>) -> Self {
        self.config.stream_path = path.into();
        self
    }

    /// Set the maximum number of simultaneously displayed notifications
    pub fn with_max_visible(mut self, max_visible: usize) -> Self {
        self.config.max_visible = max_visible;
        self
    }

    /// Set the auto-dismiss delay for non-persistent notifications
    pub fn with_auto_dismiss(mut self, delay: Duration) -> Self {
        self.config.auto_dismiss = delay;
        self
    }

    /// Set the initial reconnect backoff
    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.config.base_backoff = backoff;
        self
    }

    /// Set the upper bound on the reconnect backoff
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.config.max_backoff = backoff;
        self
    }

    /// Set the number of reconnect attempts before giving up
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> NotifyConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_channel_contract() {
        let config = NotifyConfig::new(Url::parse("http://localhost:5000").unwrap());
        assert_eq!(config.max_visible, 5);
        assert_eq!(config.auto_dismiss, Duration::from_secs(10));
        assert_eq!(config.base_backoff, Duration::from_millis(1000));
        assert_eq!(config.max_backoff, Duration::from_millis(30_000));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(
            config.stream_url().unwrap().as_str(),
            "http://localhost:5000/api/event-stream"
        );
    }

    #[test]
    fn builder_overrides_apply() {
        let config = NotifyConfig::builder(Url::parse("http://localhost:5000").unwrap())
            .with_stream_path("/events")
            .with_max_visible(3)
            .with_max_reconnect_attempts(2)
            .build();
        assert_eq!(config.stream_path, "/events");
        assert_eq!(config.max_visible, 3);
        assert_eq!(config.max_reconnect_attempts, 2);
    }
}
