//! # Asset Worker
//!
//! The request interceptor itself: lifecycle (install, activate),
//! policy dispatch on fetch, administrative control messages, and
//! web-push handling. One worker serves every page of the origin;
//! partitions are shared through the store's atomic primitives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::CacheError;
use crate::network::{HttpNetwork, Network};
use crate::partition::{Partition, PartitionStore};
use crate::policy::{RequestClass, classify};
use crate::types::{AssetRequest, AssetResponse};

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Network,
    Cache,
    /// Cached root page substituted for an uncached document
    Fallback,
}

/// Result of routing one intercepted request
#[derive(Debug)]
pub enum FetchOutcome {
    /// Cross-origin request, not intercepted
    Passthrough,
    /// Response produced by one of the caching policies
    Served {
        response: AssetResponse,
        source: ServedFrom,
    },
}

/// Administrative messages accepted by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Force-activate a pending worker version
    SkipWaiting,
    /// Delete every cache partition unconditionally
    ClearCache,
}

/// Outcome of pre-caching the install manifest
#[derive(Debug, Default)]
pub struct PrecacheReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

/// An OS-level notification assembled from a web-push payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub url: String,
}

/// What the host shell should do when a notification is clicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// Navigate an already-open same-origin window and focus it
    Focus { window: String, url: String },
    /// No same-origin window open; open a new one
    OpenWindow { url: String },
}

#[derive(Debug, Default, Deserialize)]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
    badge: Option<String>,
    tag: Option<String>,
    url: Option<String>,
}

/// The asset caching worker for one origin
pub struct AssetWorker {
    store: Arc<PartitionStore>,
    network: Arc<dyn Network>,
    config: WorkerConfig,
    skip_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl AssetWorker {
    /// Create a worker with the default reqwest-backed network
    pub fn new(config: WorkerConfig) -> Self {
        Self::with_network(config, Arc::new(HttpNetwork::default()))
    }

    /// Create a worker with an injected network implementation
    pub fn with_network(config: WorkerConfig, network: Arc<dyn Network>) -> Self {
        let store = Arc::new(PartitionStore::new(config.max_entries));
        Self {
            store,
            network,
            config,
            skip_waiting: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<PartitionStore> {
        &self.store
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Whether immediate activation has been signalled
    pub fn skip_waiting_signalled(&self) -> bool {
        self.skip_waiting.load(Ordering::Relaxed)
    }

    /// Whether this worker has claimed the origin's open pages
    pub fn has_claimed_clients(&self) -> bool {
        self.claimed.load(Ordering::Relaxed)
    }

    /// Pre-populate the static partition with the install manifest.
    ///
    /// Individual asset failures are logged and reported but never
    /// abort installation; a partial pre-cache is acceptable. Signals
    /// immediate activation on return.
    pub async fn install(&self) -> PrecacheReport {
        info!(assets = self.config.precache.len(), "Installing asset worker");
        let partition = self.store.open(&self.config.static_partition);
        let mut report = PrecacheReport::default();

        for path in &self.config.precache {
            let url = match self.config.resolve(path) {
                Ok(url) => url,
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unresolvable precache path");
                    report.failed.push(path.clone());
                    continue;
                }
            };

            let request = AssetRequest::get(url.clone());
            match self.network.fetch(&request).await {
                Ok(response) if response.is_ok() => {
                    partition.put(url.as_str(), response).await;
                    report.cached.push(path.clone());
                }
                Ok(response) => {
                    warn!(path = %path, status = %response.status, "Precache fetch returned non-success");
                    report.failed.push(path.clone());
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Precache fetch failed");
                    report.failed.push(path.clone());
                }
            }
        }

        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Static assets cached"
        );
        self.skip_waiting.store(true, Ordering::Relaxed);
        report
    }

    /// Delete every partition not matching the two current names, then
    /// claim control of the origin's open pages. Version-name bump is
    /// the sole invalidation mechanism.
    pub async fn activate(&self) -> Vec<String> {
        let current = self.config.current_partitions();
        let mut deleted = Vec::new();

        for name in self.store.names() {
            if !current.contains(&name.as_str()) {
                info!(partition = %name, "Deleting old cache partition");
                self.store.delete(&name);
                deleted.push(name);
            }
        }

        // Make sure both current partitions exist after cleanup
        self.store.open(&self.config.static_partition);
        self.store.open(&self.config.dynamic_partition);

        self.claimed.store(true, Ordering::Relaxed);
        info!("Asset worker activated");
        deleted
    }

    /// Classify a request and apply its caching policy
    pub async fn fetch(&self, request: &AssetRequest) -> Result<FetchOutcome, CacheError> {
        match classify(request, &self.config) {
            RequestClass::CrossOrigin => {
                debug!(url = %request.url, "Cross-origin request passed through");
                Ok(FetchOutcome::Passthrough)
            }
            RequestClass::Document => self.network_first(request).await,
            RequestClass::StaticAsset => self.cache_first(request).await,
            RequestClass::Dynamic => {
                // Network-only: never cached, failures propagate
                let response = self.network.fetch(request).await?;
                Ok(FetchOutcome::Served {
                    response,
                    source: ServedFrom::Network,
                })
            }
        }
    }

    /// Network-first policy for documents: fresh content when
    /// reachable, cached copy when offline, cached root as last resort
    async fn network_first(&self, request: &AssetRequest) -> Result<FetchOutcome, CacheError> {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store
                        .open(&self.config.dynamic_partition)
                        .put(request.url.as_str(), response.clone())
                        .await;
                }
                Ok(FetchOutcome::Served {
                    response,
                    source: ServedFrom::Network,
                })
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Document fetch failed, trying cache");

                if let Some(cached) = self.store.match_any(request.url.as_str()).await {
                    return Ok(FetchOutcome::Served {
                        response: cached,
                        source: ServedFrom::Cache,
                    });
                }

                let root = self
                    .config
                    .resolve("/")
                    .map_err(|err| CacheError::Url(err.to_string()))?;
                if let Some(cached) = self.store.match_any(root.as_str()).await {
                    return Ok(FetchOutcome::Served {
                        response: cached,
                        source: ServedFrom::Fallback,
                    });
                }

                Err(e)
            }
        }
    }

    /// Cache-first policy for static assets, with a fire-and-forget
    /// background refresh on every hit (stale-while-revalidate)
    async fn cache_first(&self, request: &AssetRequest) -> Result<FetchOutcome, CacheError> {
        let partition = self.store.open(&self.config.static_partition);

        if let Some(cached) = partition.get(request.url.as_str()).await {
            self.spawn_revalidate(request.clone());
            return Ok(FetchOutcome::Served {
                response: cached,
                source: ServedFrom::Cache,
            });
        }

        let response = self.network.fetch(request).await?;
        if response.is_ok() {
            partition.put(request.url.as_str(), response.clone()).await;
        }
        Ok(FetchOutcome::Served {
            response,
            source: ServedFrom::Network,
        })
    }

    fn spawn_revalidate(&self, request: AssetRequest) {
        let network = Arc::clone(&self.network);
        let partition = self.store.open(&self.config.static_partition);
        tokio::spawn(async move {
            Self::revalidate(network.as_ref(), &partition, &request).await;
        });
    }

    /// Refresh a cached static asset; failures are swallowed
    async fn revalidate(network: &dyn Network, partition: &Partition, request: &AssetRequest) {
        match network.fetch(request).await {
            Ok(response) if response.is_ok() => {
                partition.put(request.url.as_str(), response).await;
            }
            Ok(response) => {
                debug!(url = %request.url, status = %response.status, "Skipping refresh with non-success response");
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Background revalidation failed");
            }
        }
    }

    /// Handle an administrative control message
    pub fn handle_message(&self, command: WorkerCommand) {
        match command {
            WorkerCommand::SkipWaiting => {
                info!("Skip-waiting requested, activating immediately");
                self.skip_waiting.store(true, Ordering::Relaxed);
            }
            WorkerCommand::ClearCache => {
                info!("Clearing all cache partitions on request");
                self.store.delete_all();
            }
        }
    }

    /// Assemble an OS notification from a web-push payload.
    ///
    /// Missing fields take the Minipass defaults; a payload that is
    /// not JSON becomes the notification body verbatim.
    pub fn handle_push(&self, payload: &[u8]) -> OsNotification {
        let parsed: PushPayload = match serde_json::from_slice(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "Push payload is not JSON, using it as body text");
                PushPayload {
                    body: Some(String::from_utf8_lossy(payload).into_owned()),
                    ..PushPayload::default()
                }
            }
        };

        OsNotification {
            title: parsed.title.unwrap_or_else(|| "Minipass".to_string()),
            body: parsed
                .body
                .unwrap_or_else(|| "New notification".to_string()),
            icon: parsed
                .icon
                .unwrap_or_else(|| "/static/icons/icon-192x192.png".to_string()),
            badge: parsed
                .badge
                .unwrap_or_else(|| "/static/favicon.png".to_string()),
            tag: parsed
                .tag
                .unwrap_or_else(|| "minipass-notification".to_string()),
            url: parsed.url.unwrap_or_else(|| "/".to_string()),
        }
    }

    /// Decide how to react to a notification click: focus an open
    /// same-origin window if one exists, otherwise open a new one
    pub fn notification_click(
        &self,
        notification: &OsNotification,
        open_windows: &[String],
    ) -> ClickAction {
        let origin = self.config.origin.as_str().trim_end_matches('/');
        for window in open_windows {
            if window.starts_with(origin) {
                return ClickAction::Focus {
                    window: window.clone(),
                    url: notification.url.clone(),
                };
            }
        }
        ClickAction::OpenWindow {
            url: notification.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use url::Url;

    #[derive(Clone)]
    enum Rule {
        Ok(&'static str),
        Status(u16),
        Offline,
    }

    struct MockNetwork {
        rules: Mutex<HashMap<String, Rule>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockNetwork {
        fn new() -> Self {
            Self {
                rules: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn rule(&self, url: &str, rule: Rule) {
            self.rules.lock().insert(url.to_string(), rule);
        }

        fn offline(&self) {
            self.rules.lock().clear();
        }

        fn calls_for(&self, url: &str) -> usize {
            self.calls.lock().iter().filter(|c| *c == url).count()
        }
    }

    #[async_trait::async_trait]
    impl Network for MockNetwork {
        async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, CacheError> {
            let url = request.url.as_str().to_string();
            self.calls.lock().push(url.clone());

            let rule = self.rules.lock().get(&url).cloned();
            match rule {
                Some(Rule::Ok(body)) => Ok(AssetResponse::ok(body)),
                Some(Rule::Status(code)) => Ok(AssetResponse::new(
                    reqwest::StatusCode::from_u16(code).unwrap(),
                    reqwest::header::HeaderMap::new(),
                    Bytes::new(),
                )),
                Some(Rule::Offline) | None => {
                    Err(CacheError::Unreachable(format!("no route to {url}")))
                }
            }
        }
    }

    fn worker() -> (AssetWorker, Arc<MockNetwork>) {
        let network = Arc::new(MockNetwork::new());
        let config = WorkerConfig::new(Url::parse("http://localhost:5000").unwrap());
        let worker = AssetWorker::with_network(config, network.clone() as Arc<dyn Network>);
        (worker, network)
    }

    fn get(url: &str) -> AssetRequest {
        AssetRequest::get(Url::parse(url).unwrap())
    }

    fn served(outcome: FetchOutcome) -> (AssetResponse, ServedFrom) {
        match outcome {
            FetchOutcome::Served { response, source } => (response, source),
            FetchOutcome::Passthrough => panic!("expected a served response"),
        }
    }

    #[tokio::test]
    async fn install_tolerates_partial_precache() {
        let (worker, network) = worker();
        network.rule("http://localhost:5000/", Rule::Ok("<html>root</html>"));
        network.rule("http://localhost:5000/static/favicon.png", Rule::Ok("png"));
        // Everything else on the manifest stays unreachable

        let report = worker.install().await;
        assert_eq!(report.cached.len(), 2);
        assert_eq!(
            report.cached.len() + report.failed.len(),
            worker.config().precache.len()
        );
        assert!(worker.skip_waiting_signalled());

        let partition = worker.store().open("minipass-static-v1");
        assert!(partition.contains("http://localhost:5000/").await);
        assert!(
            partition
                .contains("http://localhost:5000/static/favicon.png")
                .await
        );
    }

    #[tokio::test]
    async fn activate_prunes_stale_partitions() {
        let (worker, _network) = worker();
        worker.store().open("minipass-static-v0");
        worker.store().open("minipass-dynamic-v0");
        worker.store().open("minipass-static-v1");

        let mut deleted = worker.activate().await;
        deleted.sort();
        assert_eq!(deleted, vec!["minipass-dynamic-v0", "minipass-static-v0"]);

        let mut names = worker.store().names();
        names.sort();
        assert_eq!(names, vec!["minipass-dynamic-v1", "minipass-static-v1"]);
        assert!(worker.has_claimed_clients());
    }

    #[tokio::test]
    async fn cached_static_asset_served_while_offline() {
        let (worker, network) = worker();
        let asset = "http://localhost:5000/static/icons/icon-192x192.png";
        network.rule(asset, Rule::Ok("icon bytes"));

        // Warm the cache, then go offline
        let (_, source) = served(worker.fetch(&get(asset)).await.unwrap());
        assert_eq!(source, ServedFrom::Network);
        network.offline();

        let (response, source) = served(worker.fetch(&get(asset)).await.unwrap());
        assert_eq!(source, ServedFrom::Cache);
        assert_eq!(response.body, Bytes::from("icon bytes"));
    }

    #[tokio::test]
    async fn api_requests_are_never_cached() {
        let (worker, network) = worker();
        let api = "http://localhost:5000/api/passes";
        network.rule(api, Rule::Ok("[1,2,3]"));

        let (_, source) = served(worker.fetch(&get(api)).await.unwrap());
        assert_eq!(source, ServedFrom::Network);
        let _ = served(worker.fetch(&get(api)).await.unwrap());
        assert_eq!(network.calls_for(api), 2);
        assert!(worker.store().match_any(api).await.is_none());

        // Offline: the failure propagates unmodified, no cached copy
        network.offline();
        assert!(worker.fetch(&get(api)).await.is_err());
    }

    #[tokio::test]
    async fn documents_fall_back_to_cache_then_root() {
        let (worker, network) = worker();
        let page = "http://localhost:5000/dashboard";
        network.rule(page, Rule::Ok("<html>dash</html>"));
        network.rule("http://localhost:5000/", Rule::Ok("<html>root</html>"));
        worker.install().await;

        // Online: network wins and the copy lands in the dynamic partition
        let request = get(page).with_accept("text/html");
        let (_, source) = served(worker.fetch(&request).await.unwrap());
        assert_eq!(source, ServedFrom::Network);
        assert!(
            worker
                .store()
                .open("minipass-dynamic-v1")
                .contains(page)
                .await
        );

        // Offline: cached copy is used
        network.offline();
        let (response, source) = served(worker.fetch(&request).await.unwrap());
        assert_eq!(source, ServedFrom::Cache);
        assert_eq!(response.body, Bytes::from("<html>dash</html>"));

        // Offline and never cached: the root page stands in
        let other = get("http://localhost:5000/reports").with_accept("text/html");
        let (response, source) = served(worker.fetch(&other).await.unwrap());
        assert_eq!(source, ServedFrom::Fallback);
        assert_eq!(response.body, Bytes::from("<html>root</html>"));
    }

    #[tokio::test]
    async fn document_error_propagates_without_any_cache() {
        let (worker, _network) = worker();
        let request = get("http://localhost:5000/dashboard").with_accept("text/html");
        assert!(worker.fetch(&request).await.is_err());
    }

    #[tokio::test]
    async fn non_success_documents_are_returned_but_not_cached() {
        let (worker, network) = worker();
        let page = "http://localhost:5000/missing";
        network.rule(page, Rule::Status(404));

        let request = get(page).with_accept("text/html");
        let (response, source) = served(worker.fetch(&request).await.unwrap());
        assert_eq!(source, ServedFrom::Network);
        assert_eq!(response.status, reqwest::StatusCode::NOT_FOUND);
        assert!(worker.store().match_any(page).await.is_none());
    }

    #[tokio::test]
    async fn cross_origin_requests_pass_through() {
        let (worker, network) = worker();
        let outcome = worker
            .fetch(&get("https://cdn.example.com/lib.js"))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough));
        assert_eq!(network.calls.lock().len(), 0);
    }

    #[tokio::test]
    async fn revalidation_refreshes_and_swallows_failures() {
        let (worker, network) = worker();
        let asset = "http://localhost:5000/static/app.css";
        let partition = worker.store().open("minipass-static-v1");
        partition.put(asset, AssetResponse::ok("stale")).await;

        // Refresh failure leaves the stale entry in place
        AssetWorker::revalidate(network.as_ref(), &partition, &get(asset)).await;
        assert_eq!(
            partition.get(asset).await.unwrap().body,
            Bytes::from("stale")
        );

        // Successful refresh replaces it
        network.rule(asset, Rule::Ok("fresh"));
        AssetWorker::revalidate(network.as_ref(), &partition, &get(asset)).await;
        assert_eq!(
            partition.get(asset).await.unwrap().body,
            Bytes::from("fresh")
        );

        // A non-success refresh is skipped
        network.rule(asset, Rule::Status(500));
        AssetWorker::revalidate(network.as_ref(), &partition, &get(asset)).await;
        assert_eq!(
            partition.get(asset).await.unwrap().body,
            Bytes::from("fresh")
        );
    }

    #[tokio::test]
    async fn clear_cache_command_deletes_everything() {
        let (worker, network) = worker();
        network.rule("http://localhost:5000/", Rule::Ok("root"));
        worker.install().await;
        assert!(!worker.store().names().is_empty());

        worker.handle_message(WorkerCommand::ClearCache);
        assert!(worker.store().names().is_empty());
    }

    #[tokio::test]
    async fn skip_waiting_command_sets_flag() {
        let (worker, _network) = worker();
        assert!(!worker.skip_waiting_signalled());
        worker.handle_message(WorkerCommand::SkipWaiting);
        assert!(worker.skip_waiting_signalled());
    }

    #[test]
    fn push_payload_defaults_apply_per_field() {
        let (worker, _network) = worker();

        let full = worker.handle_push(
            br#"{"title":"Payment","body":"$42.50 received","tag":"pay","url":"/payments"}"#,
        );
        assert_eq!(full.title, "Payment");
        assert_eq!(full.body, "$42.50 received");
        assert_eq!(full.tag, "pay");
        assert_eq!(full.url, "/payments");
        assert_eq!(full.icon, "/static/icons/icon-192x192.png");

        let empty = worker.handle_push(b"{}");
        assert_eq!(empty.title, "Minipass");
        assert_eq!(empty.body, "New notification");
        assert_eq!(empty.badge, "/static/favicon.png");
        assert_eq!(empty.tag, "minipass-notification");
        assert_eq!(empty.url, "/");
    }

    #[test]
    fn non_json_push_payload_becomes_body_text() {
        let (worker, _network) = worker();
        let notification = worker.handle_push(b"plain text alert");
        assert_eq!(notification.body, "plain text alert");
        assert_eq!(notification.title, "Minipass");
    }

    #[test]
    fn notification_click_focuses_or_opens() {
        let (worker, _network) = worker();
        let notification = worker.handle_push(br#"{"url":"/payments"}"#);

        let action = worker.notification_click(
            &notification,
            &[
                "https://other.example/".to_string(),
                "http://localhost:5000/dashboard".to_string(),
            ],
        );
        assert_eq!(
            action,
            ClickAction::Focus {
                window: "http://localhost:5000/dashboard".to_string(),
                url: "/payments".to_string(),
            }
        );

        let action = worker.notification_click(&notification, &[]);
        assert_eq!(
            action,
            ClickAction::OpenWindow {
                url: "/payments".to_string(),
            }
        );
    }
}
