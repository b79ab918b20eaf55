use std::time::Duration;

/// Polling interval that adapts to traffic
///
/// A non-empty batch halves the interval toward `min`, an empty one grows it
/// by half toward `max`. The value is always within `[min, max]`. With
/// adaptation disabled the interval stays at the clamped base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveInterval {
    current: Duration,
    min: Duration,
    max: Duration,
    adaptive: bool,
}

impl AdaptiveInterval {
    /// Swapped bounds are put back in order; `base` is clamped into them.
    pub fn new(base: Duration, min: Duration, max: Duration, adaptive: bool) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            current: base.clamp(min, max),
            min,
            max,
            adaptive,
        }
    }

    #[inline]
    pub fn current(&self) -> Duration {
        self.current
    }

    #[inline]
    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    /// A cycle delivered at least one message
    pub fn on_activity(&mut self) {
        if self.adaptive {
            self.current = (self.current / 2).clamp(self.min, self.max);
        }
    }

    /// A cycle came back empty
    pub fn on_idle(&mut self) {
        if self.adaptive {
            self.current = self.current.saturating_add(self.current / 2).clamp(self.min, self.max);
        }
    }
}
