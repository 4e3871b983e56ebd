use std::time::{Duration, Instant};

use tracing::debug;

/// Reader presence derived from page visibility plus a recent-activity
/// signal. Fires a callback exactly once per absent-to-present transition
/// (used to trigger a catch-up fetch).
pub struct PresenceTracker {
    visible: bool,
    last_activity: Instant,
    idle_threshold: Duration,
    present: bool,
    on_present: Option<Box<dyn FnMut() + Send>>,
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("visible", &self.visible)
            .field("present", &self.present)
            .field("idle_threshold", &self.idle_threshold)
            .finish()
    }
}

impl PresenceTracker {
    pub fn new(idle_threshold: Duration) -> Self {
        Self {
            visible: true,
            last_activity: Instant::now(),
            idle_threshold,
            present: true,
            on_present: None,
        }
    }

    /// Register the callback fired on each absent-to-present transition.
    pub fn on_present(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_present = Some(Box::new(callback));
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Page visibility changed (tab shown/hidden).
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.evaluate(Instant::now());
    }

    /// Input activity observed (keypress, pointer move).
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
        self.evaluate(Instant::now());
    }

    /// Re-derive presence against the clock; call periodically so idleness
    /// can expire presence without any triggering event.
    pub fn poll(&mut self) {
        self.evaluate(Instant::now());
    }

    fn evaluate(&mut self, now: Instant) {
        let active = now.duration_since(self.last_activity) < self.idle_threshold;
        let present_now = self.visible && active;

        if present_now && !self.present {
            debug!("reader returned, firing catch-up callback");
            if let Some(callback) = self.on_present.as_mut() {
                callback();
            }
        }
        self.present = present_now;
    }

    #[cfg(test)]
    fn evaluate_at(&mut self, now: Instant) {
        self.evaluate(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tracker_with_counter() -> (PresenceTracker, Arc<AtomicUsize>) {
        let mut tracker = PresenceTracker::new(Duration::from_secs(60));
        let fires = Arc::new(AtomicUsize::new(0));
        let counted = fires.clone();
        tracker.on_present(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        (tracker, fires)
    }

    #[test]
    fn transition_fires_exactly_once() {
        let (mut tracker, fires) = tracker_with_counter();
        assert!(tracker.is_present());

        tracker.set_visible(false);
        assert!(!tracker.is_present());
        assert_eq!(fires.load(Ordering::SeqCst), 0);

        tracker.set_visible(true);
        assert!(tracker.is_present());
        assert_eq!(fires.load(Ordering::SeqCst), 1);

        // Staying present does not re-fire.
        tracker.record_activity();
        tracker.poll();
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn idleness_expires_presence() {
        let (mut tracker, fires) = tracker_with_counter();

        let later = Instant::now() + Duration::from_secs(120);
        tracker.evaluate_at(later);
        assert!(!tracker.is_present());

        tracker.record_activity();
        assert!(tracker.is_present());
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hidden_tab_is_absent_despite_activity() {
        let (mut tracker, _fires) = tracker_with_counter();
        tracker.set_visible(false);
        tracker.record_activity();
        assert!(!tracker.is_present());
    }
}
