use std::time::Duration;

/// Growing delay between retry attempts.
///
/// Each call to [`Backoff::linear`] hands out the current delay and then
/// multiplies it for the next call, clamped to `max`. A zero `max` means the
/// delay is never clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            current: initial,
        }
    }

    /// Delay the next call to [`Backoff::linear`] will return
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Return the current delay and advance to the next one
    pub fn linear(&mut self) -> Duration {
        let delay = self.current;
        // Out of range products (overflow, negative multiplier) saturate.
        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(Duration::MAX);
        self.current = if !self.max.is_zero() && next > self.max {
            self.max
        } else {
            next
        };
        delay
    }

    /// Exponential growth is not available; use [`Backoff::linear`] with a
    /// multiplier instead.
    ///
    /// # Panics
    ///
    /// Always.
    pub fn exponential(&mut self) -> Duration {
        unimplemented!("exponential backoff is not implemented, use Backoff::linear")
    }

    /// Start over from the initial delay
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
