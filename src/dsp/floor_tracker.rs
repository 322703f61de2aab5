//! Adaptive noise-floor tracker for the spectrum display.
//!
//! Keeps one running floor estimate per display bin (dB domain) and reports
//! their mean as the display floor. Falls quickly toward quieter input and
//! rises slowly, so loud passages do not drag the floor up.
//!
//! The first update after construction or [`reset`](AdaptiveFloorTracker::reset)
//! seeds every bin from the incoming frame.

use crate::dsp::utils::lin_to_db;

/// Upward adaptation as a fraction of the downward rate.
const RISE_RATIO: f32 = 0.1;

/// Headroom below the tracked mean so steady noise sits just above zero.
const FLOOR_MARGIN_DB: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct AdaptiveFloorTracker {
    bin_floor_db: Vec<f32>,
    min_db: f32,
    max_db: f32,
    floor_db: f32,
    seeded: bool,
}

impl AdaptiveFloorTracker {
    pub fn new(bins: usize, min_db: f32, max_db: f32) -> Self {
        let (lo, hi) = ordered_bounds(min_db, max_db);
        Self {
            bin_floor_db: vec![lo; bins],
            min_db: lo,
            max_db: hi,
            floor_db: lo,
            seeded: false,
        }
    }

    /// New bounds always discard the running estimate.
    pub fn reconfigure(&mut self, min_db: f32, max_db: f32) {
        let (lo, hi) = ordered_bounds(min_db, max_db);
        self.min_db = lo;
        self.max_db = hi;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.bin_floor_db.fill(self.min_db);
        self.floor_db = self.min_db;
        self.seeded = false;
    }

    /// Folds one frame of linear magnitudes into the estimate and returns the
    /// new floor in dB. `adapt_rate` is the per-frame downward rate (0..1].
    pub fn update(&mut self, magnitudes: &[f32], adapt_rate: f32) -> f32 {
        let n = self.bin_floor_db.len().min(magnitudes.len());
        if n == 0 {
            return self.floor_db;
        }

        let rate = if adapt_rate.is_finite() {
            adapt_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let rise = rate * RISE_RATIO;

        let mut sum = 0.0f32;
        for (est, &mag) in self.bin_floor_db[..n].iter_mut().zip(magnitudes) {
            let db = lin_to_db(mag).clamp(self.min_db, self.max_db);
            if !self.seeded {
                *est = db;
            } else if db < *est {
                *est += (db - *est) * rate;
            } else {
                *est += (db - *est) * rise;
            }
            sum += *est;
        }
        self.seeded = true;

        self.floor_db = sum / n as f32 - FLOOR_MARGIN_DB;
        self.floor_db
    }

    /// Last floor returned by [`update`](Self::update).
    pub fn floor_db(&self) -> f32 {
        self.floor_db
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn bins(&self) -> usize {
        self.bin_floor_db.len()
    }
}

fn ordered_bounds(min_db: f32, max_db: f32) -> (f32, f32) {
    if min_db <= max_db {
        (min_db, max_db)
    } else {
        (max_db, min_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::utils::db_to_lin;

    fn frame(db: f32, bins: usize) -> Vec<f32> {
        vec![db_to_lin(db); bins]
    }

    #[test]
    fn test_first_update_seeds_from_frame() {
        let mut tracker = AdaptiveFloorTracker::new(16, -100.0, 0.0);
        assert!(!tracker.is_seeded());
        let floor = tracker.update(&frame(-50.0, 16), 0.05);
        assert!((floor - (-50.0 - FLOOR_MARGIN_DB)).abs() < 1e-3);
        assert!(tracker.is_seeded());
        assert_eq!(tracker.floor_db(), floor);
        assert_eq!(tracker.bins(), 16);
    }

    #[test]
    fn test_falls_faster_than_it_rises() {
        let mut down = AdaptiveFloorTracker::new(8, -100.0, 0.0);
        down.update(&frame(-40.0, 8), 0.2);
        let after_down = down.update(&frame(-60.0, 8), 0.2) + FLOOR_MARGIN_DB;

        let mut up = AdaptiveFloorTracker::new(8, -100.0, 0.0);
        up.update(&frame(-60.0, 8), 0.2);
        let after_up = up.update(&frame(-40.0, 8), 0.2) + FLOOR_MARGIN_DB;

        let moved_down = -40.0 - after_down;
        let moved_up = after_up + 60.0;
        assert!(moved_down > moved_up * 5.0);
    }

    #[test]
    fn test_silence_clamps_to_min() {
        let mut tracker = AdaptiveFloorTracker::new(4, -90.0, 0.0);
        let floor = tracker.update(&[0.0; 4], 0.2);
        assert!((floor - (-90.0 - FLOOR_MARGIN_DB)).abs() < 1e-3);
    }

    #[test]
    fn test_reset_reseeds() {
        let mut tracker = AdaptiveFloorTracker::new(4, -100.0, 0.0);
        for _ in 0..50 {
            tracker.update(&frame(-30.0, 4), 0.05);
        }
        tracker.reset();
        let floor = tracker.update(&frame(-80.0, 4), 0.05);
        assert!((floor - (-80.0 - FLOOR_MARGIN_DB)).abs() < 1e-3);
    }

    #[test]
    fn test_short_input_uses_available_bins() {
        let mut tracker = AdaptiveFloorTracker::new(8, -100.0, 0.0);
        let floor = tracker.update(&frame(-20.0, 3), 0.1);
        assert!((floor - (-20.0 - FLOOR_MARGIN_DB)).abs() < 1e-3);
        assert_eq!(tracker.update(&[], 0.1), floor);
    }
}
