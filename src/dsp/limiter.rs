//! Output Limiter
//!
//! Stereo-linked peak limiter that holds the plugin's output under a
//! user-set ceiling. It also feeds the gain-reduction meter.
//!
//! # Detection
//! - Peak envelope: instant attack, 50 ms release.
//! - Gain: instant when it must drop, 120 ms recovery.
//!
//! Both attacks are instant, so `|out| <= ceiling` holds for every sample
//! without lookahead.

use crate::dsp::utils::{db_to_lin, lin_to_db, time_constant_coeff};

const PEAK_RELEASE_MS: f32 = 50.0;
const GAIN_RELEASE_MS: f32 = 120.0;

pub struct PeakLimiter {
    peak_env: f32,
    gain_smooth: f32,

    peak_rel: f32,
    gain_rel: f32,
    sample_rate: f32,
}

impl PeakLimiter {
    pub fn new(sr: f32) -> Self {
        Self {
            peak_env: 0.0,
            gain_smooth: 1.0,
            peak_rel: time_constant_coeff(PEAK_RELEASE_MS, sr),
            gain_rel: time_constant_coeff(GAIN_RELEASE_MS, sr),
            sample_rate: sr,
        }
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        if (sr - self.sample_rate).abs() > f32::EPSILON {
            *self = Self::new(sr);
        }
    }

    /// Limits one stereo frame against `ceiling_db` (dBFS).
    #[inline]
    pub fn process(&mut self, input_l: f32, input_r: f32, ceiling_db: f32) -> (f32, f32) {
        let abs = input_l.abs().max(input_r.abs());
        let abs = if abs.is_finite() { abs } else { 0.0 };

        self.peak_env = if abs > self.peak_env {
            abs
        } else {
            self.peak_rel * self.peak_env + (1.0 - self.peak_rel) * abs
        };

        let ceiling = db_to_lin(ceiling_db.min(0.0));
        let target_gain = if self.peak_env > ceiling {
            ceiling / self.peak_env
        } else {
            1.0
        };

        if target_gain < self.gain_smooth {
            self.gain_smooth = target_gain;
        } else {
            self.gain_smooth = target_gain + self.gain_rel * (self.gain_smooth - target_gain);
        }

        (input_l * self.gain_smooth, input_r * self.gain_smooth)
    }

    /// Current gain reduction in dB (positive, for metering).
    pub fn get_gain_reduction_db(&self) -> f32 {
        (-lin_to_db(self.gain_smooth)).max(0.0)
    }

    pub fn reset(&mut self) {
        self.peak_env = 0.0;
        self.gain_smooth = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_at(i: usize, amp: f32) -> f32 {
        amp * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48000.0).sin()
    }

    #[test]
    fn test_output_never_exceeds_ceiling() {
        let mut lim = PeakLimiter::new(48000.0);
        let ceiling = db_to_lin(-6.0);
        for i in 0..48000 {
            let x = sine_at(i, 1.0);
            let (l, r) = lim.process(x, -x, -6.0);
            assert!(l.abs() <= ceiling + 1e-6);
            assert!(r.abs() <= ceiling + 1e-6);
        }
        let gr = lim.get_gain_reduction_db();
        assert!(gr > 5.0 && gr < 6.5, "gr = {gr}");
    }

    #[test]
    fn test_quiet_signal_passes_untouched() {
        let mut lim = PeakLimiter::new(48000.0);
        for i in 0..4800 {
            let x = sine_at(i, 0.1);
            let (l, r) = lim.process(x, x, -1.0);
            assert_eq!(l, x);
            assert_eq!(r, x);
        }
        assert_eq!(lim.get_gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_gain_recovers_after_burst() {
        let mut lim = PeakLimiter::new(48000.0);
        lim.process(1.0, 1.0, -12.0);
        assert!(lim.get_gain_reduction_db() > 11.0);
        for _ in 0..48000 {
            lim.process(0.0, 0.0, -12.0);
        }
        assert!(lim.get_gain_reduction_db() < 0.1);

        lim.process(1.0, 1.0, -12.0);
        lim.reset();
        assert_eq!(lim.get_gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_non_finite_input_is_ignored_by_detector() {
        let mut lim = PeakLimiter::new(48000.0);
        lim.process(f32::NAN, 0.0, -1.0);
        assert_eq!(lim.get_gain_reduction_db(), 0.0);
    }
}
