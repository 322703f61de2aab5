//! Wall-clock frame timing for render loops that do not track their own.
//!
//! The ballistics take an explicit `delta_ms`; this is the adapter for
//! callers that only know "a frame happened now".

use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds since the previous tick, or `0.0` on the first tick
    /// (which the meters read as "no history").
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Same as [`tick`](Self::tick) with an explicit timestamp.
    /// A timestamp older than the previous one yields `0.0`.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = match self.last {
            Some(prev) => now
                .checked_duration_since(prev)
                .map(|d| d.as_secs_f32() * 1000.0)
                .unwrap_or(0.0),
            None => 0.0,
        };
        self.last = Some(now);
        delta
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_tick_has_no_history() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick_at(Instant::now()), 0.0);
    }

    #[test]
    fn test_tick_measures_elapsed() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        clock.tick_at(t0);
        let dt = clock.tick_at(t0 + Duration::from_millis(20));
        assert!((dt - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_out_of_order_tick_is_zero() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now() + Duration::from_millis(50);
        clock.tick_at(t0);
        assert_eq!(clock.tick_at(t0 - Duration::from_millis(10)), 0.0);
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        clock.tick_at(t0);
        clock.reset();
        assert_eq!(clock.tick_at(t0 + Duration::from_millis(30)), 0.0);
    }
}
