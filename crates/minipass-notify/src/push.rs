//! # Push Subscriptions
//!
//! Client for the server's web-push endpoints: fetching the VAPID
//! public key and registering or removing a push subscription.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::NotifyConfig;
use crate::error::NotifyError;
use crate::render::create_client;

/// Encryption keys attached to a push subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A serialized push subscription as produced by the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VapidKeyResponse {
    public_key: String,
}

#[derive(Debug, Serialize)]
struct SubscribeBody<'a> {
    subscription: &'a PushSubscription,
}

#[derive(Debug, Serialize)]
struct UnsubscribeBody<'a> {
    endpoint: &'a str,
}

/// Client for the Minipass push subscription endpoints
pub struct PushClient {
    client: Client,
    base_url: Url,
}

impl PushClient {
    pub fn new(config: &NotifyConfig) -> Result<Self, NotifyError> {
        Ok(Self {
            client: create_client(config)?,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, NotifyError> {
        self.base_url
            .join(path)
            .map_err(|e| NotifyError::Url(format!("{path}: {e}")))
    }

    /// Fetch the server's VAPID public key, decoded from URL-safe
    /// base64 to the raw bytes the platform subscribe call expects
    pub async fn vapid_public_key(&self) -> Result<Vec<u8>, NotifyError> {
        let endpoint = self.endpoint("/api/push/vapid-public-key")?;
        let response = self.client.get(endpoint).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::StatusCode(response.status()));
        }

        let body: VapidKeyResponse = response.json().await?;
        decode_vapid_key(&body.public_key)
    }

    /// Register a push subscription with the server
    pub async fn subscribe(&self, subscription: &PushSubscription) -> Result<(), NotifyError> {
        let endpoint = self.endpoint("/api/push/subscribe")?;
        let response = self
            .client
            .post(endpoint)
            .json(&SubscribeBody { subscription })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::StatusCode(response.status()));
        }
        Ok(())
    }

    /// Remove a push subscription, identified by its endpoint URL
    pub async fn unsubscribe(&self, endpoint_url: &str) -> Result<(), NotifyError> {
        let endpoint = self.endpoint("/api/push/unsubscribe")?;
        let response = self
            .client
            .post(endpoint)
            .json(&UnsubscribeBody {
                endpoint: endpoint_url,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::StatusCode(response.status()));
        }
        Ok(())
    }
}

/// Decode a URL-safe base64 VAPID key, tolerating present or absent
/// padding
pub fn decode_vapid_key(key: &str) -> Result<Vec<u8>, NotifyError> {
    let trimmed = key.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| NotifyError::PushKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_url_safe_key_with_and_without_padding() {
        // "hello" in URL-safe base64
        assert_eq!(decode_vapid_key("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_vapid_key("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn decodes_url_safe_alphabet() {
        // 0xfb 0xff maps to "-_8" in the URL-safe alphabet
        assert_eq!(decode_vapid_key("-_8").unwrap(), vec![0xfb, 0xff]);
        assert!(decode_vapid_key("not base64!!").is_err());
    }

    #[test]
    fn subscribe_body_shape_matches_server_contract() {
        let subscription = PushSubscription {
            endpoint: "https://push.example/abc".to_string(),
            keys: SubscriptionKeys {
                p256dh: "key".to_string(),
                auth: "secret".to_string(),
            },
        };
        let body = serde_json::to_value(SubscribeBody {
            subscription: &subscription,
        })
        .unwrap();
        assert_eq!(
            body["subscription"]["endpoint"],
            "https://push.example/abc"
        );
        assert_eq!(body["subscription"]["keys"]["p256dh"], "key");
        assert_eq!(body["subscription"]["keys"]["auth"], "secret");
    }

    #[test]
    fn unsubscribe_body_carries_endpoint_only() {
        let body = serde_json::to_value(UnsubscribeBody {
            endpoint: "https://push.example/abc",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"endpoint": "https://push.example/abc"}));
    }

    #[test]
    fn vapid_response_uses_camel_case() {
        let parsed: VapidKeyResponse =
            serde_json::from_str(r#"{"publicKey":"aGVsbG8"}"#).unwrap();
        assert_eq!(parsed.public_key, "aGVsbG8");
    }
}
