//! Quasi-peak meter ballistics.
//!
//! Turns one raw level sample per UI/meter frame into two display values:
//!
//! - **current**: one-pole smoothed level, drives the main bar fill.
//! - **peak**: the quasi-peak latched at its maximum, held for
//!   `peak_hold_ms`, then falling linearly at `peak_decay_db_per_sec`.
//!
//! # Design Notes
//! - Time is always supplied by the caller as `delta_ms`. A step of `0` means
//!   "no history" and is treated as one 16 ms frame; every step is clamped to
//!   `[1, 100]` ms so a paused or stuttering render loop cannot blow up the
//!   integrators.
//! - The arithmetic is a pure function on [`MeterState`]; [`MeterBallistics`]
//!   only owns a config and a state.
//! - Two input domains share one shape: linear level (0..1 full scale) and
//!   gain-reduction magnitude in dB (0 = no reduction).
//!
//! # Time Constants
//! - **Quasi-peak attack**: configurable (default 5 ms).
//! - **Quasi-peak fall**: 30 ms toward the input while signal is present.
//! - **Silence release**: 50 ms toward zero, then a hard snap to exactly 0.

use serde::{Deserialize, Serialize};

use crate::dsp::utils::{frame_coeff, resolve_delta_ms, sanitize_level};

// =============================================================================
// Constants
// =============================================================================

/// Release toward zero once the input is below the silence gate (ms).
const SILENCE_RELEASE_MS: f32 = 50.0;

/// Quasi-peak fall toward a lower, non-silent input (ms).
const QUASI_PEAK_FALL_MS: f32 = 30.0;

/// Linear silence gate (~ -60 dBFS).
const LINEAR_SILENCE_THRESHOLD: f32 = 0.001;

/// Gain-reduction silence gate (dB of reduction).
const GR_SILENCE_THRESHOLD_DB: f32 = 0.1;

/// dB span assumed when a dB/s decay rate is applied to a 0..1 linear meter.
const LINEAR_METER_SPAN_DB: f32 = 60.0;

const MAX_CURRENT_SMOOTHING: f32 = 0.99;
const MIN_PEAK_ATTACK_MS: f32 = 0.1;

// =============================================================================
// Configuration
// =============================================================================

/// Timing constants for one meter. Immutable between reconfigurations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallisticsConfig {
    /// Quasi-peak integration time on rising input.
    pub peak_attack_ms: f32,
    /// How long the peak marker stays put after the quasi-peak drops.
    pub peak_hold_ms: f32,
    /// Linear fall of the peak marker once the hold expires.
    pub peak_decay_db_per_sec: f32,
    /// One-pole coefficient for `current` (0 = no smoothing, 0.99 = heavy).
    pub current_smoothing: f32,
}

impl Default for BallisticsConfig {
    fn default() -> Self {
        Self {
            peak_attack_ms: 5.0,
            peak_hold_ms: 300.0,
            peak_decay_db_per_sec: 12.0,
            current_smoothing: 0.6,
        }
    }
}

impl BallisticsConfig {
    /// Returns a copy with every field forced into its usable range.
    /// Non-finite fields fall back to the defaults.
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let pick = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        Self {
            peak_attack_ms: pick(self.peak_attack_ms, d.peak_attack_ms).max(MIN_PEAK_ATTACK_MS),
            peak_hold_ms: pick(self.peak_hold_ms, d.peak_hold_ms).max(0.0),
            peak_decay_db_per_sec: pick(self.peak_decay_db_per_sec, d.peak_decay_db_per_sec)
                .max(0.0),
            current_smoothing: pick(self.current_smoothing, d.current_smoothing)
                .clamp(0.0, MAX_CURRENT_SMOOTHING),
        }
    }
}

/// Units of the value fed to the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterDomain {
    /// Linear level, 1.0 = full scale.
    Linear,
    /// Gain-reduction magnitude in dB, 0 = no reduction.
    GainReductionDb,
}

impl MeterDomain {
    #[inline]
    fn silence_threshold(self) -> f32 {
        match self {
            MeterDomain::Linear => LINEAR_SILENCE_THRESHOLD,
            MeterDomain::GainReductionDb => GR_SILENCE_THRESHOLD_DB,
        }
    }

    /// Peak-marker fall for one step, in the domain's own units.
    #[inline]
    fn peak_decay_step(self, config: &BallisticsConfig, delta_ms: f32) -> f32 {
        let db_step = config.peak_decay_db_per_sec * delta_ms / 1000.0;
        match self {
            MeterDomain::Linear => db_step / LINEAR_METER_SPAN_DB,
            MeterDomain::GainReductionDb => db_step,
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Snapshot of one meter. All levels are `>= 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterState {
    /// Attack/fall-integrated peak (not the true instantaneous peak).
    pub quasi_peak: f32,
    /// Latched maximum of `quasi_peak`; what the peak marker shows.
    pub held_peak: f32,
    /// Smoothed level for the bar fill.
    pub current: f32,
    /// Countdown before `held_peak` starts to fall.
    pub hold_remaining_ms: f32,
}

impl MeterState {
    /// Steps the meter by one frame and returns the new state.
    ///
    /// * `input` - raw level in `domain` units; NaN/inf/negative read as 0.
    /// * `delta_ms` - time since the previous step, `0` if there is none.
    pub fn advance(
        self,
        config: &BallisticsConfig,
        domain: MeterDomain,
        input: f32,
        delta_ms: f32,
    ) -> MeterState {
        let config = config.sanitized();
        let dt = resolve_delta_ms(delta_ms);
        let value = sanitize_level(input);
        let threshold = domain.silence_threshold();

        let mut next = self;

        // 1. Level integrators
        if value < threshold {
            let release = frame_coeff(dt, SILENCE_RELEASE_MS);
            next.quasi_peak -= next.quasi_peak * release;
            next.current -= next.current * release;

            // Land exactly on the bottom of the scale
            if next.quasi_peak < threshold {
                next.quasi_peak = 0.0;
            }
            if next.current < threshold {
                next.current = 0.0;
            }
        } else {
            let coeff = if value > next.quasi_peak {
                frame_coeff(dt, config.peak_attack_ms)
            } else {
                frame_coeff(dt, QUASI_PEAK_FALL_MS)
            };
            next.quasi_peak += (value - next.quasi_peak) * coeff;

            let s = config.current_smoothing;
            next.current = next.current * s + value * (1.0 - s);
        }

        // 2. Peak hold / decay
        if next.quasi_peak >= next.held_peak {
            next.held_peak = next.quasi_peak;
            next.hold_remaining_ms = config.peak_hold_ms;
        } else if next.hold_remaining_ms > 0.0 {
            next.hold_remaining_ms = (next.hold_remaining_ms - dt).max(0.0);
        } else {
            next.held_peak = (next.held_peak - domain.peak_decay_step(&config, dt)).max(0.0);
        }

        next
    }
}

// =============================================================================
// Meter
// =============================================================================

/// One visual meter: config plus state, stepped once per frame.
#[derive(Debug, Clone, Default)]
pub struct MeterBallistics {
    config: BallisticsConfig,
    state: MeterState,
}

impl MeterBallistics {
    pub fn new(config: BallisticsConfig) -> Self {
        Self {
            config: config.sanitized(),
            state: MeterState::default(),
        }
    }

    /// Linear-domain step (peak/RMS level, 1.0 = full scale).
    #[inline]
    pub fn update(&mut self, value: f32, delta_ms: f32) {
        self.state = self
            .state
            .advance(&self.config, MeterDomain::Linear, value, delta_ms);
    }

    /// Gain-reduction step: `value_db` is the reduction magnitude, 0 = none.
    #[inline]
    pub fn update_db(&mut self, value_db: f32, delta_ms: f32) {
        self.state =
            self.state
                .advance(&self.config, MeterDomain::GainReductionDb, value_db, delta_ms);
    }

    /// "Clear meters": drops every level and the hold countdown.
    pub fn reset(&mut self) {
        self.state = MeterState::default();
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.state.current
    }

    #[inline]
    pub fn peak(&self) -> f32 {
        self.state.held_peak
    }

    pub fn state(&self) -> MeterState {
        self.state
    }

    pub fn config(&self) -> &BallisticsConfig {
        &self.config
    }

    /// Swaps timing constants without touching the displayed levels.
    pub fn set_config(&mut self, config: BallisticsConfig) {
        self.config = config.sanitized();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: f32 = 16.0;

    #[test]
    fn test_first_sample_approaches_from_below() {
        for &v in &[0.0005f32, 0.01, 0.25, 0.8, 1.0, 3.0] {
            let mut meter = MeterBallistics::default();
            meter.reset();
            meter.update(v, 0.0);
            assert!(meter.current() <= v, "current overshoot for {v}");
            assert!(meter.peak() <= v, "peak overshoot for {v}");
            if v >= LINEAR_SILENCE_THRESHOLD {
                assert!(meter.current() > 0.0);
                assert!(meter.peak() > 0.0);
            }
        }
    }

    #[test]
    fn test_missing_history_uses_default_frame() {
        let mut a = MeterBallistics::default();
        let mut b = MeterBallistics::default();
        a.update(0.5, 0.0);
        b.update(0.5, 16.0);
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn test_silence_reaches_exact_zero() {
        let mut meter = MeterBallistics::default();
        for _ in 0..30 {
            meter.update(0.9, FRAME_MS);
        }
        assert!(meter.peak() > 0.8);

        let mut frames = 0;
        while (meter.current() != 0.0 || meter.peak() != 0.0) && frames < 1000 {
            meter.update(0.0, FRAME_MS);
            frames += 1;
        }
        assert_eq!(meter.current(), 0.0);
        assert_eq!(meter.peak(), 0.0);
        // 300 ms hold + 0.9 / (12 / 60 per second) = ~4.8 s of decay
        assert!(frames < 400, "took {frames} frames");

        // Further silence stays exactly at zero
        for _ in 0..10 {
            meter.update(0.0, FRAME_MS);
        }
        assert_eq!(meter.state().quasi_peak, 0.0);
        assert_eq!(meter.current(), 0.0);
    }

    #[test]
    fn test_peak_holds_then_falls_monotonically() {
        let config = BallisticsConfig::default();
        let mut meter = MeterBallistics::new(config);
        for _ in 0..20 {
            meter.update(0.7, FRAME_MS);
        }
        let latched = meter.peak();

        // While input stays constant the marker never drops
        for _ in 0..20 {
            meter.update(0.7, FRAME_MS);
            assert!(meter.peak() >= latched);
        }
        let latched = meter.peak();

        let mut elapsed = 0.0;
        let mut prev = latched;
        let mut seen_decay = false;
        for _ in 0..200 {
            meter.update(0.0, FRAME_MS);
            elapsed += FRAME_MS;
            let p = meter.peak();
            if elapsed <= config.peak_hold_ms {
                assert_eq!(p, latched, "peak moved during hold at {elapsed} ms");
            }
            assert!(p <= prev, "peak rose at {elapsed} ms");
            if p < prev {
                seen_decay = true;
            }
            prev = p;
        }
        assert!(seen_decay);
    }

    #[test]
    fn test_gain_reduction_scenario() {
        let config = BallisticsConfig::default();
        let mut meter = MeterBallistics::new(config);
        meter.update_db(20.0, 0.0);
        let held = meter.peak();
        assert!(held > 19.0 && held <= 20.0);
        let first_current = meter.current();

        let mut elapsed = 0.0f32;
        let mut current_zero_at = None;
        let mut prev_peak = held;
        while elapsed < 2000.0 {
            meter.update_db(0.0, FRAME_MS);
            elapsed += FRAME_MS;

            if elapsed <= config.peak_hold_ms {
                assert_eq!(meter.peak(), held);
            } else if meter.peak() > 0.0 && prev_peak > 0.0 && elapsed > config.peak_hold_ms + 32.0
            {
                // Linear fall at 12 dB/s = 0.192 dB per 16 ms frame
                let step = prev_peak - meter.peak();
                assert!((step - 0.192).abs() < 1e-3, "step {step} at {elapsed} ms");
            }
            if current_zero_at.is_none() && meter.current() == 0.0 {
                current_zero_at = Some(elapsed);
            }
            prev_peak = meter.peak();
        }

        assert_eq!(meter.peak(), 0.0);
        assert!(first_current > 0.0);
        let current_zero_at = current_zero_at.unwrap();
        assert!(current_zero_at < config.peak_hold_ms);
    }

    #[test]
    fn test_quasi_peak_ignores_single_spike() {
        let mut meter = MeterBallistics::new(BallisticsConfig {
            peak_attack_ms: 50.0,
            ..BallisticsConfig::default()
        });
        meter.update(1.0, FRAME_MS);
        // Slow attack integrates only part of the spike
        assert!(meter.peak() < 0.5);
    }

    #[test]
    fn test_non_finite_input_is_silence() {
        let mut meter = MeterBallistics::default();
        meter.update(0.5, FRAME_MS);
        meter.update(f32::NAN, FRAME_MS);
        meter.update(f32::INFINITY, FRAME_MS);
        meter.update_db(f32::NEG_INFINITY, FRAME_MS);
        meter.update(-4.0, FRAME_MS);
        assert!(meter.current().is_finite() && meter.current() >= 0.0);
        assert!(meter.peak().is_finite() && meter.peak() >= 0.0);
        assert!(meter.current() < 0.5);
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut a = MeterBallistics::default();
        let mut b = MeterBallistics::default();
        a.update(0.5, 10_000.0);
        b.update(0.5, 100.0);
        assert_eq!(a.state(), b.state());

        let mut c = MeterBallistics::default();
        let mut d = MeterBallistics::default();
        c.update(0.5, 0.01);
        d.update(0.5, 1.0);
        assert_eq!(c.state(), d.state());
    }

    #[test]
    fn test_config_sanitized() {
        let cfg = BallisticsConfig {
            peak_attack_ms: -3.0,
            peak_hold_ms: f32::NAN,
            peak_decay_db_per_sec: -1.0,
            current_smoothing: 4.0,
        }
        .sanitized();
        assert_eq!(cfg.peak_attack_ms, MIN_PEAK_ATTACK_MS);
        assert_eq!(cfg.peak_hold_ms, 300.0);
        assert_eq!(cfg.peak_decay_db_per_sec, 0.0);
        assert_eq!(cfg.current_smoothing, MAX_CURRENT_SMOOTHING);
    }

    #[test]
    fn test_advance_is_pure() {
        let cfg = BallisticsConfig::default();
        let s0 = MeterState::default();
        let s1 = s0.advance(&cfg, MeterDomain::Linear, 0.4, FRAME_MS);
        let s1b = s0.advance(&cfg, MeterDomain::Linear, 0.4, FRAME_MS);
        assert_eq!(s1, s1b);
        assert_eq!(s0, MeterState::default());
    }

    #[test]
    fn test_update_does_not_allocate() {
        let mut meter = MeterBallistics::default();
        assert_no_alloc::assert_no_alloc(|| {
            for i in 0..64 {
                meter.update((i as f32 * 0.1).sin().abs(), FRAME_MS);
                meter.update_db(i as f32 * 0.2, FRAME_MS);
            }
        });
        assert!(meter.peak() > 0.0);
    }
}
