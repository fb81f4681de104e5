//! Network access seam for the worker, mockable in tests.

use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::error::CacheError;
use crate::types::{AssetRequest, AssetResponse};

/// Outbound network access used by the worker
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Perform the request against the real network
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, CacheError>;
}

/// Network implementation backed by a reqwest client
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpNetwork {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, CacheError> {
        debug!(url = %request.url, method = %request.method, "Fetching from network");

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body: Bytes = response.bytes().await?;

        Ok(AssetResponse::new(status, headers, body))
    }
}
