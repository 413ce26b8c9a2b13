use std::time::{Duration, Instant};

/// Trailing-edge debounce: every trigger cancels the outstanding deadline and
/// schedules a new one `window` later. `fire_if_due` reports at most one
/// firing per burst of triggers.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending firing if its deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(150);

    #[test]
    fn test_burst_fires_once_after_last_trigger() {
        let start = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        for i in 0..10 {
            d.trigger(start + Duration::from_millis(i * 10));
        }
        let last = start + Duration::from_millis(90);

        assert!(!d.fire_if_due(last + Duration::from_millis(149)));
        assert!(d.fire_if_due(last + WINDOW));
        assert!(!d.fire_if_due(last + WINDOW * 2));
    }

    #[test]
    fn test_retrigger_pushes_deadline_back() {
        let now = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        d.trigger(now);
        d.trigger(now + Duration::from_millis(20));
        assert_eq!(d.deadline(), Some(now + Duration::from_millis(20) + WINDOW));
        assert!(!d.fire_if_due(now + WINDOW));
    }

    #[test]
    fn test_cancel_drops_pending_firing() {
        let now = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        d.trigger(now);
        d.cancel();
        assert_eq!(d.deadline(), None);
        assert!(!d.fire_if_due(now + WINDOW));
    }
}
