//! # Connection State
//!
//! Explicit state machine for the notification channel lifecycle.
//! The machine holds no timers; the stream controller drives delays
//! through its [`Clock`](crate::clock::Clock), which keeps reconnect
//! behavior testable without real time.

use std::time::Duration;

/// Status of the notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Channel establishment in progress
    Connecting,
    /// Channel established and delivering events
    Open,
    /// Channel lost, reconnection pending
    Closed,
    /// Reconnection abandoned, manual reload required
    Failed,
}

/// Decision taken after the channel closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Retry after waiting out the given backoff
    RetryAfter(Duration),
    /// Attempt cap exceeded, the channel is permanently down
    GiveUp,
}

/// Reconnect state for a single notification channel.
///
/// Backoff grows as `base * 2^(attempt-1)` up to a hard cap, and resets
/// to the base value on any successful connection.
#[derive(Debug)]
pub struct ConnectionState {
    status: ConnectionStatus,
    reconnect_attempt: u32,
    backoff: Duration,
    base_backoff: Duration,
    max_backoff: Duration,
    max_attempts: u32,
}

impl ConnectionState {
    /// Create a new state machine, starting in `Connecting`
    pub fn new(base_backoff: Duration, max_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            reconnect_attempt: 0,
            backoff: base_backoff,
            base_backoff,
            max_backoff,
            max_attempts,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// The channel was established: reset attempt counter and backoff
    pub fn opened(&mut self) {
        self.status = ConnectionStatus::Open;
        self.reconnect_attempt = 0;
        self.backoff = self.base_backoff;
    }

    /// The channel was lost or explicitly closed
    pub fn lost(&mut self) {
        if self.status != ConnectionStatus::Failed {
            self.status = ConnectionStatus::Closed;
        }
    }

    /// Decide the next move after the channel closed.
    ///
    /// Increments the attempt counter; exceeding the cap transitions to
    /// the terminal `Failed` state.
    pub fn schedule_reconnect(&mut self) -> ReconnectDecision {
        if self.status == ConnectionStatus::Failed {
            return ReconnectDecision::GiveUp;
        }

        if self.reconnect_attempt >= self.max_attempts {
            self.status = ConnectionStatus::Failed;
            return ReconnectDecision::GiveUp;
        }

        self.reconnect_attempt += 1;
        let exponent = self.reconnect_attempt.saturating_sub(1).min(16);
        let delay = self
            .base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);
        self.backoff = delay;

        ReconnectDecision::RetryAfter(delay)
    }

    /// Begin a connection attempt
    pub fn connecting(&mut self) {
        if self.status != ConnectionStatus::Failed {
            self.status = ConnectionStatus::Connecting;
        }
    }

    /// Request an immediate reconnect, bypassing any pending backoff.
    ///
    /// Used when the page becomes visible again while the channel is
    /// down. Has no effect once the machine has failed terminally.
    pub fn force_reconnect(&mut self) -> bool {
        if self.status == ConnectionStatus::Closed {
            self.status = ConnectionStatus::Connecting;
            true
        } else {
            false
        }
    }
}
