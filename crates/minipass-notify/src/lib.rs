//! # Minipass Notify
//!
//! A client engine for the Minipass admin live-notification channel.
//! Maintains a long-lived streaming connection to the server, renders a
//! bounded tray of transient notifications, and recovers from connection
//! loss with exponential backoff.
//!
//! ## Features
//!
//! - Server-sent event decoding with per-message fault isolation
//! - Explicit reconnect state machine with capped exponential backoff
//! - Bounded notification tray with oldest-first eviction
//! - Server-rendered notification fragments with local fallback
//! - Push subscription management against the Minipass push endpoints

pub mod clock;
pub mod config;
pub mod connection;
pub mod display;
pub mod error;
pub mod event;
pub mod push;
pub mod render;
pub mod stream;

pub use clock::{Clock, TokioClock};
pub use config::{NotifyConfig, NotifyConfigBuilder};
pub use connection::{ConnectionState, ConnectionStatus, ReconnectDecision};
pub use display::{DisplayedNotification, NotificationTray};
pub use error::NotifyError;
pub use event::{EventKind, FrameDecoder, StreamEvent};
pub use push::{PushClient, PushSubscription, SubscriptionKeys};
pub use render::{FragmentSource, HttpFragmentSource, fallback_fragment};
pub use stream::{
    ChannelSource, EventByteStream, HttpChannelSource, NotificationStream, PageEvent,
    StreamCommand, StreamHandle, TrayEvent,
};
