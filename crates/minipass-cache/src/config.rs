use url::Url;

/// Current partition identifiers. Bumping a version suffix is the
/// invalidation mechanism: activation deletes every partition whose
/// name no longer matches.
pub const STATIC_PARTITION: &str = "minipass-static-v1";
pub const DYNAMIC_PARTITION: &str = "minipass-dynamic-v1";

/// Assets pre-cached into the static partition on install
pub const PRECACHE_MANIFEST: &[&str] = &[
    "/",
    "/static/favicon.png",
    "/static/favicon.svg",
    "/static/icons/icon-192x192.png",
    "/static/icons/icon-512x512.png",
    "/static/minipass_pwa_logo.jpg",
    "/static/apple-touch-icon.png",
];

/// Configurable options for the asset worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Origin the worker is scoped to; other origins pass through
    pub origin: Url,

    /// Name of the static cache partition
    pub static_partition: String,

    /// Name of the dynamic cache partition
    pub dynamic_partition: String,

    /// Paths pre-cached on install
    pub precache: Vec<String>,

    /// Path prefix treated as static regardless of extension
    pub static_prefix: String,

    /// Maximum entries per partition
    pub max_entries: u64,
}

impl WorkerConfig {
    /// Create a configuration with the current partition names and
    /// precache manifest for the given origin
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            static_partition: STATIC_PARTITION.to_string(),
            dynamic_partition: DYNAMIC_PARTITION.to_string(),
            precache: PRECACHE_MANIFEST.iter().map(|s| s.to_string()).collect(),
            static_prefix: "/static/".to_string(),
            max_entries: 256,
        }
    }

    /// Override the partition names (used when bumping cache versions)
    pub fn with_partitions(
        mut self,
        static_partition: impl Into<String>,
        dynamic_partition: impl Into<String>,
    ) -> Self {
        self.static_partition = static_partition.into();
        self.dynamic_partition = dynamic_partition.into();
        self
    }

    /// Override the precache manifest
    pub fn with_precache<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Override the maximum entries per partition
    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Resolve a path against the worker's origin
    pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        self.origin.join(path)
    }

    /// The names activation keeps; everything else is deleted
    pub fn current_partitions(&self) -> [&str; 2] {
        [&self.static_partition, &self.dynamic_partition]
    }
}
