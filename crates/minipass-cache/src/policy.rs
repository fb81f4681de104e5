//! # Request Classification
//!
//! Every intercepted request falls into exactly one class, evaluated
//! in precedence order: cross-origin passthrough, documents
//! (network-first), static assets (cache-first), everything else
//! (network-only).

use url::Url;

use crate::config::WorkerConfig;
use crate::types::AssetRequest;

/// File extensions treated as static assets
pub const STATIC_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "svg", "gif", "ico", "css", "js", "woff", "woff2", "ttf",
];

/// Caching class of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Different origin, passed through untouched
    CrossOrigin,
    /// HTML navigation, network-first
    Document,
    /// Static asset, cache-first with background revalidation
    StaticAsset,
    /// API or other dynamic data, network-only
    Dynamic,
}

/// Classify a request against the worker's origin and static rules
pub fn classify(request: &AssetRequest, config: &WorkerConfig) -> RequestClass {
    if !same_origin(&request.url, &config.origin) {
        return RequestClass::CrossOrigin;
    }

    if request
        .accept()
        .is_some_and(|accept| accept.contains("text/html"))
    {
        return RequestClass::Document;
    }

    if is_static_path(request.url.path(), &config.static_prefix) {
        return RequestClass::StaticAsset;
    }

    RequestClass::Dynamic
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host() == b.host() && a.port_or_known_default() == b.port_or_known_default()
}

fn is_static_path(path: &str, static_prefix: &str) -> bool {
    if path.starts_with(static_prefix) {
        return true;
    }

    match path.rsplit_once('.') {
        Some((_, extension)) => STATIC_EXTENSIONS
            .iter()
            .any(|candidate| extension.eq_ignore_ascii_case(candidate)),
        None => false,
    }
}
