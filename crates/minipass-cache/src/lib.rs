//! # Minipass Cache
//!
//! The asset caching worker for the Minipass admin client. Classifies
//! every same-origin request and applies one of three caching
//! policies: network-first for documents, cache-first with background
//! revalidation for static assets, and network-only for API calls.
//! Two named cache partitions are invalidated solely by version-name
//! bump or manual clear.

pub mod config;
pub mod error;
pub mod network;
pub mod partition;
pub mod policy;
pub mod types;
pub mod worker;

pub use config::WorkerConfig;
pub use error::CacheError;
pub use network::{HttpNetwork, Network};
pub use partition::{Partition, PartitionStore};
pub use policy::{RequestClass, classify};
pub use types::{AssetRequest, AssetResponse};
pub use worker::{
    AssetWorker, ClickAction, FetchOutcome, OsNotification, PrecacheReport, ServedFrom,
    WorkerCommand,
};
