//! TelemetryFeed - most-recent-wins stats channel
//!
//! Stats/telemetry events are display-only: they are never merged into the
//! RecordStore and carry no identity or ordering requirement beyond "most
//! recent wins", which is exactly the semantics of a watch channel.

use crate::event_stream::StatsFrame;
use tokio::sync::watch;

/// TelemetryFeed instance
pub struct TelemetryFeed {
    tx: watch::Sender<Option<StatsFrame>>,
}

impl TelemetryFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Overwrite the current frame
    pub fn publish(&self, frame: StatsFrame) {
        // send_replace never fails even with no subscribers
        self.tx.send_replace(Some(frame));
    }

    /// Watch for frame updates
    pub fn subscribe(&self) -> watch::Receiver<Option<StatsFrame>> {
        self.tx.subscribe()
    }

    /// Most recently published frame, if any
    pub fn latest(&self) -> Option<StatsFrame> {
        self.tx.borrow().clone()
    }
}

impl Default for TelemetryFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(score: f64) -> StatsFrame {
        StatsFrame {
            score,
            cam: Some("WEB-01".to_string()),
            confirmed: false,
        }
    }

    #[tokio::test]
    async fn test_most_recent_wins() {
        let feed = TelemetryFeed::new();
        feed.publish(frame(0.1));
        feed.publish(frame(0.7));
        assert_eq!(feed.latest().unwrap().score, 0.7);
    }

    #[tokio::test]
    async fn test_subscriber_sees_latest_only() {
        let feed = TelemetryFeed::new();
        let mut rx = feed.subscribe();
        feed.publish(frame(0.2));
        feed.publish(frame(0.9));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().score, 0.9);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let feed = TelemetryFeed::new();
        feed.publish(frame(0.5));
        assert!(feed.latest().is_some());
    }
}
