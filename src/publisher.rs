//! The publishing seam between the HTTP layer and the broker.
//!
//! Handlers depend only on [`EventPublisher`]; the Kafka implementation
//! lives in [`crate::kafka::KafkaProducer`] and can be wrapped by
//! [`crate::retry::RetryingPublisher`].

use crate::events::Event;
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where an acknowledged event ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Publish attempts made, including the successful one.
    pub attempts: u32,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Delivers one event and waits until every in-sync replica has it.
    async fn publish(&self, event: &Event) -> Result<DeliveryReceipt>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    Connecting,
    Publishing,
    Acked,
    Failed,
    Closed,
}

impl PublishState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PublishState::Acked | PublishState::Failed)
    }

    pub fn can_transition_to(self, next: PublishState) -> bool {
        use PublishState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Publishing)
                | (Connecting, Failed)
                | (Publishing, Acked)
                | (Publishing, Failed)
                | (Acked, Closed)
                | (Failed, Closed)
        )
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Idle => "idle",
            PublishState::Connecting => "connecting",
            PublishState::Publishing => "publishing",
            PublishState::Acked => "acked",
            PublishState::Failed => "failed",
            PublishState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome counters shared by every publish of one publisher.
#[derive(Debug, Default)]
pub struct PublishStats {
    acked: AtomicU64,
    failed: AtomicU64,
    closed: AtomicU64,
    open_connections: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishStatsSnapshot {
    pub acked: u64,
    pub failed: u64,
    pub closed: u64,
    pub open_connections: u64,
}

impl PublishStats {
    pub fn snapshot(&self) -> PublishStatsSnapshot {
        PublishStatsSnapshot {
            acked: self.acked.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            closed: self.closed.load(Ordering::SeqCst),
            open_connections: self.open_connections.load(Ordering::SeqCst),
        }
    }

    pub fn connection_opened(&self) {
        self.open_connections.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connection_released(&self) {
        self.open_connections.fetch_sub(1, Ordering::SeqCst);
    }

    fn record(&self, state: PublishState) {
        let counter = match state {
            PublishState::Acked => &self.acked,
            PublishState::Failed => &self.failed,
            PublishState::Closed => &self.closed,
            _ => return,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Follows a single publish through its lifecycle.
///
/// Dropping the tracker closes it, whichever terminal state was reached
/// (or fails it first if the publish was abandoned midway).
#[derive(Debug)]
pub struct PublishTracker {
    topic: &'static str,
    state: PublishState,
    stats: Option<Arc<PublishStats>>,
}

impl PublishTracker {
    pub fn new(topic: &'static str) -> Self {
        Self {
            topic,
            state: PublishState::Idle,
            stats: None,
        }
    }

    pub fn with_stats(topic: &'static str, stats: Arc<PublishStats>) -> Self {
        Self {
            topic,
            state: PublishState::Idle,
            stats: Some(stats),
        }
    }

    pub fn state(&self) -> PublishState {
        self.state
    }

    /// Moves to `next`, ignoring illegal transitions.
    pub fn advance(&mut self, next: PublishState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                topic = self.topic,
                from = %self.state,
                to = %next,
                "Ignoring illegal publish state transition"
            );
            return false;
        }
        debug!(topic = self.topic, from = %self.state, to = %next, "Publish state");
        self.state = next;
        if let Some(stats) = &self.stats {
            stats.record(next);
        }
        true
    }

    pub fn close(&mut self) {
        if self.state == PublishState::Closed {
            return;
        }
        if !self.state.is_terminal() {
            // abandoned before an outcome, e.g. the future was dropped
            self.state = PublishState::Failed;
            if let Some(stats) = &self.stats {
                stats.record(PublishState::Failed);
            }
        }
        self.advance(PublishState::Closed);
    }
}

impl Drop for PublishTracker {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::PublishState::*;
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut tracker = PublishTracker::new("cat_created");
        assert!(tracker.advance(Connecting));
        assert!(tracker.advance(Publishing));
        assert!(tracker.advance(Acked));
        tracker.close();
        assert_eq!(tracker.state(), Closed);
    }

    #[test]
    fn test_connection_failure_goes_straight_to_failed() {
        let mut tracker = PublishTracker::new("cat_deleted");
        tracker.advance(Connecting);
        assert!(tracker.advance(Failed));
        tracker.close();
        assert_eq!(tracker.state(), Closed);
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        let mut tracker = PublishTracker::new("cat_updated");
        assert!(!tracker.advance(Publishing));
        assert!(!tracker.advance(Acked));
        assert_eq!(tracker.state(), Idle);

        assert!(!Acked.can_transition_to(Failed));
        assert!(!Closed.can_transition_to(Idle));
    }

    #[test]
    fn test_close_from_non_terminal_state() {
        let mut tracker = PublishTracker::new("cat_created");
        tracker.advance(Connecting);
        tracker.advance(Publishing);
        tracker.close();
        assert_eq!(tracker.state(), Closed);
    }

    #[test]
    fn test_stats_count_outcomes() {
        let stats = Arc::new(PublishStats::default());
        {
            let mut tracker = PublishTracker::with_stats("cat_created", stats.clone());
            tracker.advance(Connecting);
            tracker.advance(Publishing);
            tracker.advance(Acked);
        }
        {
            let mut tracker = PublishTracker::with_stats("cat_created", stats.clone());
            tracker.advance(Connecting);
            tracker.advance(Failed);
        }
        {
            // dropped midway
            let mut tracker = PublishTracker::with_stats("cat_created", stats.clone());
            tracker.advance(Connecting);
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.acked, 1);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.closed, 3);
    }

    #[test]
    fn test_terminal_states() {
        assert!(Acked.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Publishing.is_terminal());
        assert!(!Closed.is_terminal());
    }
}
