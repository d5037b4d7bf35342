//! Aggregate health-change broadcasts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Published after every completed probe cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthEvent {
    /// Providers whose last check was healthy
    pub healthy_providers: usize,
    /// Providers probed in the cycle
    pub total_providers: usize,
    /// When the cycle completed
    pub timestamp: DateTime<Utc>,
}

impl HealthEvent {
    /// Create an event for a completed cycle
    pub fn new(healthy_providers: usize, total_providers: usize) -> Self {
        Self {
            healthy_providers,
            total_providers,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast channel for health events
///
/// Slow subscribers lag and drop old events rather than backpressuring the
/// scheduler.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HealthEvent>,
}

impl EventBus {
    /// Create a bus with the given buffered-event capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to health events
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; a bus with no subscribers drops it silently
    pub fn publish(&self, event: HealthEvent) {
        let _ = self.sender.send(event);
    }

    /// Current subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
