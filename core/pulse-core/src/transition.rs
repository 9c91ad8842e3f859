//! Edge detection on the waiting-session count.

use serde::Serialize;

/// Raised once when waiting work appears after a poll with none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertEvent {
    pub waiting_count: usize,
}

/// Remembers the previous poll's waiting count. Starts at zero, so waiting
/// sessions that already exist at startup alert on the first poll.
#[derive(Debug, Default)]
pub struct TransitionTracker {
    previous_waiting_count: usize,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_waiting_count(&self) -> usize {
        self.previous_waiting_count
    }

    /// Records `waiting_count`; alerts only on the 0 → positive edge.
    pub fn observe(&mut self, waiting_count: usize) -> Option<AlertEvent> {
        let alert = (self.previous_waiting_count == 0 && waiting_count > 0)
            .then_some(AlertEvent { waiting_count });
        self.previous_waiting_count = waiting_count;
        alert
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_only_on_rising_edge_from_zero() {
        let mut tracker = TransitionTracker::new();
        let alerts: Vec<Option<AlertEvent>> = [0, 0, 3, 3, 5, 0, 2]
            .into_iter()
            .map(|count| tracker.observe(count))
            .collect();

        assert_eq!(
            alerts,
            vec![
                None,
                None,
                Some(AlertEvent { waiting_count: 3 }),
                None,
                None,
                None,
                Some(AlertEvent { waiting_count: 2 }),
            ]
        );
        assert_eq!(tracker.previous_waiting_count(), 2);
    }

    #[test]
    fn waiting_at_startup_alerts_on_first_poll() {
        let mut tracker = TransitionTracker::new();
        assert!(tracker.observe(1).is_some());
        assert!(tracker.observe(1).is_none());
    }

    #[test]
    fn decrease_without_reaching_zero_does_not_rearm() {
        let mut tracker = TransitionTracker::new();
        assert!(tracker.observe(4).is_some());
        assert!(tracker.observe(1).is_none());
        assert!(tracker.observe(4).is_none());
    }
}
