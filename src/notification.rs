use std::time::{Duration, Instant};

/// How long an authoring error stays visible before it clears itself.
pub const DEFAULT_NOTICE_WINDOW: Duration = Duration::from_millis(3000);

/// A transient message raised at a point in time.
///
/// Authoring errors are shown inline for a fixed window and then disappear on
/// their own; a `Notice` records when it was raised so callers can ask whether
/// it is still live without running a timer.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice<T> {
    pub value: T,
    pub raised_at: Instant,
}

impl<T> Notice<T> {
    pub fn new(value: T) -> Self {
        Self::raised_at(value, Instant::now())
    }

    pub fn raised_at(value: T, raised_at: Instant) -> Self {
        Notice { value, raised_at }
    }

    /// True once `window` has fully elapsed since the notice was raised.
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.raised_at) >= window
    }

    /// The payload while the notice is live, `None` afterwards.
    pub fn active(&self, now: Instant, window: Duration) -> Option<&T> {
        if self.is_expired(now, window) {
            None
        } else {
            Some(&self.value)
        }
    }
}
