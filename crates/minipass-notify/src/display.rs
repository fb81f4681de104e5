//! # Notification Tray
//!
//! Bounded set of currently displayed notifications, owned exclusively
//! by one stream controller. Enforces the capacity invariant (oldest
//! evicted before insertion beyond the limit) and tracks auto-dismiss
//! deadlines, including hover pause/resume.

use std::time::{Duration, Instant};

use tracing::debug;

/// A notification currently presented to the user
#[derive(Debug, Clone)]
pub struct DisplayedNotification {
    /// Event id the notification was created from
    pub id: String,
    /// Rendered fragment shown to the user
    pub body: String,
    /// When the notification was inserted
    pub created_at: Instant,
    /// Persistent notifications never auto-dismiss
    pub persistent: bool,
    /// Absolute auto-dismiss deadline, cleared while paused
    deadline: Option<Instant>,
    /// Remaining countdown captured on pause
    paused_remaining: Option<Duration>,
}

impl DisplayedNotification {
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_paused(&self) -> bool {
        self.paused_remaining.is_some()
    }
}

/// Bounded tray of displayed notifications
#[derive(Debug)]
pub struct NotificationTray {
    entries: Vec<DisplayedNotification>,
    max_visible: usize,
    auto_dismiss: Duration,
}

impl NotificationTray {
    pub fn new(max_visible: usize, auto_dismiss: Duration) -> Self {
        Self {
            entries: Vec::new(),
            max_visible: max_visible.max(1),
            auto_dismiss,
        }
    }

    /// Insert a notification, evicting the oldest entries first if the
    /// tray is at capacity. Returns the ids evicted to make room.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        body: impl Into<String>,
        persistent: bool,
        now: Instant,
    ) -> Vec<String> {
        let id = id.into();

        // Re-announcing an id replaces the previous entry
        self.entries.retain(|n| n.id != id);

        let mut evicted = Vec::new();
        while self.entries.len() >= self.max_visible {
            let oldest = self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, n)| n.created_at)
                .map(|(i, _)| i);
            match oldest {
                Some(index) => {
                    let removed = self.entries.remove(index);
                    debug!(id = %removed.id, "Evicting oldest notification to respect capacity");
                    evicted.push(removed.id);
                }
                None => break,
            }
        }

        let deadline = (!persistent).then(|| now + self.auto_dismiss);
        self.entries.push(DisplayedNotification {
            id,
            body: body.into(),
            created_at: now,
            persistent,
            deadline,
            paused_remaining: None,
        });

        evicted
    }

    /// Dismiss a notification by id. Idempotent: unknown ids are a no-op.
    pub fn dismiss(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|n| n.id != id);
        before != self.entries.len()
    }

    /// Dismiss every displayed notification
    pub fn dismiss_all(&mut self) -> Vec<String> {
        self.entries.drain(..).map(|n| n.id).collect()
    }

    /// Pause the auto-dismiss countdown (hover enter)
    pub fn pause(&mut self, id: &str, now: Instant) {
        if let Some(entry) = self.entries.iter_mut().find(|n| n.id == id)
            && let Some(deadline) = entry.deadline.take()
        {
            entry.paused_remaining = Some(deadline.saturating_duration_since(now));
        }
    }

    /// Resume a paused countdown (hover leave), re-arming the deadline
    /// from the remaining time captured at pause
    pub fn resume(&mut self, id: &str, now: Instant) {
        if let Some(entry) = self.entries.iter_mut().find(|n| n.id == id)
            && let Some(remaining) = entry.paused_remaining.take()
        {
            entry.deadline = Some(now + remaining);
        }
    }

    /// Remove and return every notification whose deadline has passed
    pub fn expire_due(&mut self, now: Instant) -> Vec<String> {
        let mut expired = Vec::new();
        self.entries.retain(|n| match n.deadline {
            Some(deadline) if deadline <= now => {
                expired.push(n.id.clone());
                false
            }
            _ => true,
        });
        expired
    }

    /// Earliest pending auto-dismiss deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().filter_map(|n| n.deadline).min()
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|n| n.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&DisplayedNotification> {
        self.entries.iter().find(|n| n.id == id)
    }
}
