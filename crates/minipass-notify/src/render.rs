//! # Fragment Rendering
//!
//! Notifications are rendered server-side: the engine POSTs the raw
//! event to a kind-specific endpoint and receives an HTML fragment
//! back. When that fetch fails for any reason, a locally synthesized
//! minimal fragment takes its place so the notification is never
//! silently dropped.

use std::fmt::Write as _;

use reqwest::Client;
use url::Url;

use crate::config::NotifyConfig;
use crate::error::NotifyError;
use crate::event::{EventKind, StreamEvent};

/// Source of rendered notification fragments
#[async_trait::async_trait]
pub trait FragmentSource: Send + Sync {
    /// Fetch the rendered fragment for a renderable event
    async fn fetch(&self, event: &StreamEvent) -> Result<String, NotifyError>;
}

/// Fragment source backed by the server's rendering endpoints
pub struct HttpFragmentSource {
    client: Client,
    base_url: Url,
}

impl HttpFragmentSource {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, event: &StreamEvent) -> Result<Url, NotifyError> {
        let path = match event.kind {
            EventKind::Payment => format!("/api/payment-notification-html/{}", event.id),
            EventKind::Signup => format!("/api/signup-notification-html/{}", event.id),
            other => {
                return Err(NotifyError::Url(format!(
                    "no rendering endpoint for {other:?} events"
                )));
            }
        };
        self.base_url
            .join(&path)
            .map_err(|e| NotifyError::Url(format!("{path}: {e}")))
    }
}

#[async_trait::async_trait]
impl FragmentSource for HttpFragmentSource {
    async fn fetch(&self, event: &StreamEvent) -> Result<String, NotifyError> {
        let endpoint = self.endpoint(event)?;
        let response = self.client.post(endpoint).json(event).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::StatusCode(response.status()));
        }

        Ok(response.text().await?)
    }
}

/// Build a reqwest client suitable for the rendering endpoints
pub fn create_client(config: &NotifyConfig) -> Result<Client, NotifyError> {
    let mut builder = Client::builder().user_agent(&config.user_agent);
    if !config.connect_timeout.is_zero() {
        builder = builder.connect_timeout(config.connect_timeout);
    }
    builder.build().map_err(NotifyError::from)
}

/// Synthesize a minimal fragment locally when the rendering fetch
/// fails. Always carries the user name and, for payments, the amount.
pub fn fallback_fragment(event: &StreamEvent) -> String {
    let is_payment = event.kind == EventKind::Payment;
    let title = if is_payment {
        "Payment Received"
    } else {
        "New Registration"
    };
    let user = event.data_str("user_name").unwrap_or("Unknown User");

    let mut fragment = String::new();
    let _ = write!(fragment, "{title}: {user}");

    if let Some(email) = event.data_str("email") {
        let _ = write!(fragment, " <{email}>");
    }
    if let Some(activity) = event.data_str("activity") {
        let _ = write!(fragment, " - {activity}");
    }
    if is_payment {
        let amount = event.data_f64("amount").unwrap_or(0.0);
        let _ = write!(fragment, " (${amount:.2})");
    } else if let Some(passport) = event.data_str("passport_type") {
        let _ = write!(fragment, " [{passport}]");
    }
    if let Some(message) = event.data_str("message") {
        let _ = write!(fragment, " {message}");
    }

    fragment
}
