use std::time::{Duration, Instant};

/// Taps needed to trigger the hidden reset.
pub const RESET_TAPS: u32 = 8;

/// Longest allowed gap between consecutive taps.
pub const TAP_WINDOW: Duration = Duration::from_secs(3);

/// Counts rapid taps on the hidden developer control.
#[derive(Debug, Clone, Default)]
pub struct ResetGesture {
    count: u32,
    last_tap: Option<Instant>,
}

impl ResetGesture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tap at `now`. Returns true when this tap completes the
    /// sequence; the counter then starts over.
    pub fn tap(&mut self, now: Instant) -> bool {
        let in_window = self
            .last_tap
            .is_some_and(|last| now.saturating_duration_since(last) <= TAP_WINDOW);
        self.count = if in_window { self.count + 1 } else { 1 };
        self.last_tap = Some(now);

        if self.count >= RESET_TAPS {
            self.count = 0;
            self.last_tap = None;
            return true;
        }
        false
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
