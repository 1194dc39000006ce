//! Throttled push of full frames to remote observers.
//!
//! Frames go out on every other rendered frame and not at all while nobody
//! is listening. The tracked observer count follows connect/disconnect
//! events and is periodically reconciled against the channel's own receiver
//! count, so a missed disconnect cannot keep the push running forever.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::models::performance::BroadcastStats;

/// Name of the event carrying a frame snapshot.
pub const FRAME_EVENT: &str = "led_update";

const CHANNEL_CAPACITY: usize = 4;

#[derive(Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<Arc<str>>,
    inner: Arc<Mutex<BroadcastInner>>,
    tracked: Arc<AtomicUsize>,
}

struct BroadcastInner {
    check_interval: u64,
    frame_count: u64,
    emissions_sent: u64,
    emissions_skipped: u64,
    led_count: usize,
}

/// A connected observer. Dropping it counts as a disconnect.
pub struct Subscription {
    receiver: broadcast::Receiver<Arc<str>>,
    tracked: Arc<AtomicUsize>,
}

impl Subscription {
    /// Next frame payload. Lagging observers skip straight to the newest
    /// frame. `None` once the broadcaster is gone.
    pub async fn next(&mut self) -> Option<Arc<str>> {
        loop {
            match self.receiver.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("[broadcast] Observer lagged, skipped {} frames", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Saturating: reconciliation may already have corrected the count.
        let _ = self
            .tracked
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

impl Broadcaster {
    pub fn new(check_interval: u64, led_count: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            inner: Arc::new(Mutex::new(BroadcastInner {
                check_interval: check_interval.max(1),
                frame_count: 0,
                emissions_sent: 0,
                emissions_skipped: 0,
                led_count,
            })),
            tracked: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let receiver = self.sender.subscribe();
        self.tracked.fetch_add(1, Ordering::SeqCst);
        log::debug!("[broadcast] Observer connected ({} active)", self.active_observers());
        Subscription {
            receiver,
            tracked: self.tracked.clone(),
        }
    }

    pub fn active_observers(&self) -> usize {
        self.tracked.load(Ordering::SeqCst)
    }

    /// Count one rendered frame and decide whether to push it.
    pub fn should_emit(&self) -> bool {
        let mut guard = self.inner.lock().expect("broadcaster poisoned");
        guard.frame_count += 1;

        if guard.frame_count % guard.check_interval == 0 {
            let actual = self.sender.receiver_count();
            let tracked = self.tracked.swap(actual, Ordering::SeqCst);
            if tracked != actual {
                log::debug!(
                    "[broadcast] Observer count drifted: tracked {}, actual {}",
                    tracked,
                    actual
                );
            }
        }

        let emit = self.tracked.load(Ordering::SeqCst) > 0 && guard.frame_count % 2 == 0;
        if emit {
            guard.emissions_sent += 1;
        } else {
            guard.emissions_skipped += 1;
        }
        emit
    }

    /// Fire-and-forget. A send with no receivers is not an error.
    pub fn send(&self, payload: Arc<str>) {
        let _ = self.sender.send(payload);
    }

    pub fn stats(&self) -> BroadcastStats {
        let guard = self.inner.lock().expect("broadcaster poisoned");
        let efficiency = if guard.frame_count > 0 {
            (guard.emissions_skipped as f64 / guard.frame_count as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        BroadcastStats {
            active_clients: self.active_observers(),
            total_frames: guard.frame_count,
            emissions_sent: guard.emissions_sent,
            emissions_skipped: guard.emissions_skipped,
            efficiency_percent: efficiency,
            led_count: guard.led_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nobody_listening_means_nothing_sent() {
        let broadcaster = Broadcaster::new(30, 10);
        // 5 s at 30 fps
        let sent = (0..150).filter(|_| broadcaster.should_emit()).count();
        assert_eq!(sent, 0);
        let stats = broadcaster.stats();
        assert_eq!(stats.emissions_skipped, 150);
        assert_eq!(stats.efficiency_percent, 100.0);
    }

    #[test]
    fn one_listener_gets_every_other_frame() {
        let broadcaster = Broadcaster::new(30, 10);
        let _observer = broadcaster.subscribe();
        let sent = (0..151).filter(|_| broadcaster.should_emit()).count() as i64;
        assert!((sent - 75).abs() <= 1, "sent {}", sent);
    }

    #[test]
    fn dropped_subscription_stops_the_push() {
        let broadcaster = Broadcaster::new(30, 10);
        let observer = broadcaster.subscribe();
        assert_eq!(broadcaster.active_observers(), 1);
        drop(observer);
        assert_eq!(broadcaster.active_observers(), 0);
        assert_eq!((0..10).filter(|_| broadcaster.should_emit()).count(), 0);
    }

    #[test]
    fn reconciliation_corrects_drift() {
        let broadcaster = Broadcaster::new(3, 10);
        // A disconnect the tracker never heard about.
        broadcaster.tracked.store(2, Ordering::SeqCst);
        assert!(!broadcaster.should_emit());
        assert!(broadcaster.should_emit());
        // Frame 3 reconciles against zero real receivers.
        assert!(!broadcaster.should_emit());
        assert_eq!(broadcaster.active_observers(), 0);
        assert!(!broadcaster.should_emit());
    }

    #[tokio::test]
    async fn subscribers_receive_sent_frames() {
        let broadcaster = Broadcaster::new(30, 1);
        let mut observer = broadcaster.subscribe();
        broadcaster.send(Arc::from("[[]]"));
        assert_eq!(observer.next().await.as_deref(), Some("[[]]"));
    }
}
