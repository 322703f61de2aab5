//! Dynamic-range normalizer for spectrum / level displays.
//!
//! Maps linear magnitudes (one per display bin) to `[0, 1]` through a dB
//! window picked by [`DynamicRangeMode`]. The window is either fixed, taken
//! from the configured bounds, or follows an adaptive noise floor.
//!
//! # Contract
//! - Output is always in `[0, 1]`, one value per display bin.
//! - Zero, negative and non-finite magnitudes map to `0.0`.
//! - The effective floor is always at least 1 dB under the ceiling.
//! - `normalize` does not allocate; the output buffer is sized once.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::dsp::floor_tracker::AdaptiveFloorTracker;

// =============================================================================
// Constants
// =============================================================================

/// Bound changes smaller than this are treated as no-ops (dB).
const RECONFIGURE_EPSILON_DB: f32 = 1e-3;

/// Adaptive floor rate while nothing is happening.
const SILENCE_ADAPT_RATE: f32 = 0.2;

/// Adaptive floor rate during speech, slow so loud passages do not lift it.
const ACTIVE_ADAPT_RATE: f32 = 0.05;

/// Narrowest window the normalizer will divide by (dB).
const MIN_RANGE_DB: f32 = 1.0;

pub const DEFAULT_MIN_DB: f32 = -100.0;
pub const DEFAULT_MAX_DB: f32 = 0.0;

// =============================================================================
// Modes
// =============================================================================

/// Which floor/ceiling pair a display uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicRangeMode {
    /// -120..0 dB
    Full,
    /// -80..0 dB
    VoiceOptimized,
    /// -60..0 dB
    Compressed,
    /// Adaptive floor up to the configured ceiling.
    NoiseFloor,
    /// Configured `min_db..max_db` as-is.
    Custom,
}

impl DynamicRangeMode {
    /// Fixed `(floor_db, ceiling_db)` for the preset windows.
    pub fn fixed_window(self) -> Option<(f32, f32)> {
        match self {
            DynamicRangeMode::Full => Some((-120.0, 0.0)),
            DynamicRangeMode::VoiceOptimized => Some((-80.0, 0.0)),
            DynamicRangeMode::Compressed => Some((-60.0, 0.0)),
            DynamicRangeMode::NoiseFloor | DynamicRangeMode::Custom => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DynamicRangeMode::Full => "Full",
            DynamicRangeMode::VoiceOptimized => "Voice Optimized",
            DynamicRangeMode::Compressed => "Compressed",
            DynamicRangeMode::NoiseFloor => "Noise Floor",
            DynamicRangeMode::Custom => "Custom",
        }
    }
}

impl Default for DynamicRangeMode {
    fn default() -> Self {
        DynamicRangeMode::VoiceOptimized
    }
}

/// Frame classification supplied by the analysis side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoicingState {
    Silence,
    Voiced,
    Unvoiced,
}

impl VoicingState {
    /// Decodes the wire byte: 0 silence, 1 voiced, 2 unvoiced.
    /// Unknown values are treated as voiced (slow floor adaptation).
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => VoicingState::Silence,
            2 => VoicingState::Unvoiced,
            _ => VoicingState::Voiced,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            VoicingState::Silence => 0,
            VoicingState::Voiced => 1,
            VoicingState::Unvoiced => 2,
        }
    }

    #[inline]
    pub fn floor_adapt_rate(self) -> f32 {
        match self {
            VoicingState::Silence => SILENCE_ADAPT_RATE,
            VoicingState::Voiced | VoicingState::Unvoiced => ACTIVE_ADAPT_RATE,
        }
    }
}

impl Default for VoicingState {
    fn default() -> Self {
        VoicingState::Silence
    }
}

// =============================================================================
// Normalizer
// =============================================================================

/// Maps one magnitude to `[0, 1]` inside a `floor_db..ceiling_db` window.
#[inline]
pub fn normalize_magnitude(magnitude: f32, floor_db: f32, range_db: f32) -> f32 {
    if magnitude <= 0.0 || !magnitude.is_finite() {
        return 0.0;
    }
    let db = 20.0 * magnitude.log10();
    ((db - floor_db) / range_db).clamp(0.0, 1.0)
}

pub struct DynamicRangeNormalizer {
    min_db: f32,
    max_db: f32,
    mode: DynamicRangeMode,
    tracker: AdaptiveFloorTracker,
    output: Vec<f32>,
    window: (f32, f32),
}

impl DynamicRangeNormalizer {
    pub fn new(display_bins: usize, min_db: f32, max_db: f32, mode: DynamicRangeMode) -> Self {
        let min_db = finite_or(min_db, DEFAULT_MIN_DB);
        let max_db = finite_or(max_db, DEFAULT_MAX_DB);
        Self {
            min_db,
            max_db,
            mode,
            tracker: AdaptiveFloorTracker::new(display_bins, min_db, max_db),
            output: vec![0.0; display_bins],
            window: (min_db.min(max_db - MIN_RANGE_DB), max_db),
        }
    }

    /// Applies new bounds/mode. The adaptive floor is only discarded when a
    /// bound moves by more than 1e-3 dB or the mode changes; returns whether
    /// that happened. Non-finite bounds keep the previous value.
    /// A change within 1e-3 dB is dropped: the previous bounds stay stored.
    pub fn update_processing(&mut self, min_db: f32, max_db: f32, mode: DynamicRangeMode) -> bool {
        let min_db = if min_db.is_finite() {
            min_db
        } else {
            warn!("ignoring non-finite display floor {min_db}");
            self.min_db
        };
        let max_db = if max_db.is_finite() {
            max_db
        } else {
            warn!("ignoring non-finite display ceiling {max_db}");
            self.max_db
        };

        let changed = (min_db - self.min_db).abs() > RECONFIGURE_EPSILON_DB
            || (max_db - self.max_db).abs() > RECONFIGURE_EPSILON_DB
            || mode != self.mode;
        if !changed {
            return false;
        }

        debug!(
            "display range {} {:.1}..{:.1} dB -> {} {:.1}..{:.1} dB",
            self.mode.name(),
            self.min_db,
            self.max_db,
            mode.name(),
            min_db,
            max_db
        );
        self.min_db = min_db;
        self.max_db = max_db;
        self.mode = mode;
        self.tracker.reconfigure(min_db, max_db);
        true
    }

    /// Normalizes one frame. Bins beyond `magnitudes.len()` read as silence.
    pub fn normalize(&mut self, magnitudes: &[f32], voicing: VoicingState) -> &[f32] {
        let (floor_db, ceiling_db) = self.select_window(magnitudes, voicing);

        let floor_db = floor_db.min(ceiling_db - MIN_RANGE_DB);
        let range_db = (ceiling_db - floor_db).max(MIN_RANGE_DB);
        self.window = (floor_db, ceiling_db);

        let n = magnitudes.len().min(self.output.len());
        for (out, &mag) in self.output[..n].iter_mut().zip(magnitudes) {
            *out = normalize_magnitude(mag, floor_db, range_db);
        }
        self.output[n..].fill(0.0);

        &self.output
    }

    fn select_window(&mut self, magnitudes: &[f32], voicing: VoicingState) -> (f32, f32) {
        match self.mode {
            DynamicRangeMode::Full
            | DynamicRangeMode::VoiceOptimized
            | DynamicRangeMode::Compressed => self
                .mode
                .fixed_window()
                .unwrap_or((self.min_db, self.max_db)),
            DynamicRangeMode::NoiseFloor => {
                let ceiling = self.max_db;
                let tracked = self.tracker.update(magnitudes, voicing.floor_adapt_rate());
                // max/min rather than clamp: bounds may be inverted by the caller
                let floor = tracked.max(self.min_db).min(self.max_db - MIN_RANGE_DB);
                (floor, ceiling)
            }
            DynamicRangeMode::Custom => (self.min_db, self.max_db),
        }
    }

    /// Window applied by the most recent `normalize` call.
    pub fn current_window(&self) -> (f32, f32) {
        self.window
    }

    /// Last output, without recomputing.
    pub fn output(&self) -> &[f32] {
        &self.output
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.output.fill(0.0);
    }

    pub fn display_bins(&self) -> usize {
        self.output.len()
    }

    pub fn mode(&self) -> DynamicRangeMode {
        self.mode
    }

    pub fn min_db(&self) -> f32 {
        self.min_db
    }

    pub fn max_db(&self) -> f32 {
        self.max_db
    }
}

fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

// =============================================================================
// Tests
// =============================================================================
