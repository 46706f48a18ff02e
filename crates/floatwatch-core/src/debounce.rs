//! Debounce guard
//!
//! Suppresses duplicate overlay triggers within a fixed cooldown window.
//! Two logical states, `Ready` and `Cooling`, evaluated lazily against the
//! caller's clock on each arrival; no background timer.

use tracing::debug;

/// Default cooldown between accepted triggers
pub const DEFAULT_COOLDOWN_MS: i64 = 3000;

/// Single piece of shared pipeline state: the last-accepted timestamp.
/// Owned by the dispatcher's serialized lane; never touched elsewhere.
#[derive(Debug)]
pub struct DebounceGuard {
    cooldown_ms: i64,
    last_accepted_at_ms: i64,
}

impl Default for DebounceGuard {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_MS)
    }
}

impl DebounceGuard {
    pub fn new(cooldown_ms: i64) -> Self {
        Self {
            cooldown_ms,
            last_accepted_at_ms: 0,
        }
    }

    /// Accept or drop a qualifying event at time `now_ms`.
    ///
    /// Accepting stamps the window; at most one acceptance per cooldown
    /// window regardless of how many events arrive from either channel.
    pub fn try_accept(&mut self, now_ms: i64) -> bool {
        if now_ms - self.last_accepted_at_ms < self.cooldown_ms {
            debug!(
                elapsed_ms = now_ms - self.last_accepted_at_ms,
                cooldown_ms = self.cooldown_ms,
                "cooling, event dropped"
            );
            return false;
        }
        self.last_accepted_at_ms = now_ms;
        true
    }

    /// Would an event at `now_ms` be accepted? No state change.
    pub fn is_ready(&self, now_ms: i64) -> bool {
        now_ms - self.last_accepted_at_ms >= self.cooldown_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_event_accepted() {
        let mut guard = DebounceGuard::default();
        assert!(guard.try_accept(10_000));
    }

    #[test]
    fn test_second_event_inside_window_dropped() {
        let mut guard = DebounceGuard::default();
        assert!(guard.try_accept(10_000));
        assert!(!guard.try_accept(12_999));
    }

    #[test]
    fn test_ready_again_after_window() {
        let mut guard = DebounceGuard::default();
        assert!(guard.try_accept(10_000));
        assert!(guard.try_accept(13_000));
    }

    #[test]
    fn test_drop_does_not_extend_window() {
        let mut guard = DebounceGuard::default();
        assert!(guard.try_accept(10_000));
        // A dropped event must not restart the cooldown.
        assert!(!guard.try_accept(12_000));
        assert!(guard.try_accept(13_000));
    }

    #[test]
    fn test_custom_window() {
        let mut guard = DebounceGuard::new(100);
        assert!(guard.try_accept(0));
        assert!(!guard.try_accept(99));
        assert!(guard.try_accept(100));
    }

    #[test]
    fn test_is_ready_has_no_side_effect() {
        let mut guard = DebounceGuard::default();
        guard.try_accept(10_000);
        assert!(!guard.is_ready(11_000));
        assert!(guard.is_ready(13_000));
        assert!(guard.try_accept(13_000));
    }
}
