//! Time source abstraction so reconnect and dismissal logic can be
//! driven without real timers in tests.

use std::time::{Duration, Instant};

/// Source of time and delays for the stream controller
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend for the given duration
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait::async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
