//! Thread-safe metering taps shared between the audio and UI threads.
//!
//! Every value is an `f32` stored as bits in an `AtomicU32` with relaxed
//! ordering. A reader may see values from two different blocks, which is
//! fine for a meter.

use std::sync::atomic::{AtomicU32, Ordering};

/// Loudness reported before the first block has been measured.
pub const LOUDNESS_FLOOR_LUFS: f32 = -70.0;

/// The five ballistic meters the plugin drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterId {
    InputL,
    InputR,
    OutputL,
    OutputR,
    GainReduction,
}

impl MeterId {
    pub const ALL: [MeterId; 5] = [
        MeterId::InputL,
        MeterId::InputR,
        MeterId::OutputL,
        MeterId::OutputR,
        MeterId::GainReduction,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            MeterId::InputL => "input_l",
            MeterId::InputR => "input_r",
            MeterId::OutputL => "output_l",
            MeterId::OutputR => "output_r",
            MeterId::GainReduction => "gain_reduction",
        }
    }
}

#[inline]
fn store(a: &AtomicU32, val: f32) {
    a.store(val.to_bits(), Ordering::Relaxed);
}

#[inline]
fn load(a: &AtomicU32) -> f32 {
    f32::from_bits(a.load(Ordering::Relaxed))
}

/// Raw per-block taps plus the ballistic values derived from them.
pub struct Meters {
    input_peak_l: AtomicU32,
    input_peak_r: AtomicU32,
    output_peak_l: AtomicU32,
    output_peak_r: AtomicU32,
    gain_reduction_db: AtomicU32,
    momentary_lufs: AtomicU32,

    // Ballistic (current, peak) per MeterId
    ballistic_current: [AtomicU32; 5],
    ballistic_peak: [AtomicU32; 5],
}

impl Default for Meters {
    fn default() -> Self {
        Self {
            input_peak_l: AtomicU32::new(0),
            input_peak_r: AtomicU32::new(0),
            output_peak_l: AtomicU32::new(0),
            output_peak_r: AtomicU32::new(0),
            gain_reduction_db: AtomicU32::new(0),
            momentary_lufs: AtomicU32::new(LOUDNESS_FLOOR_LUFS.to_bits()),
            ballistic_current: Default::default(),
            ballistic_peak: Default::default(),
        }
    }
}

impl Meters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input_peak_l(&self, val: f32) {
        store(&self.input_peak_l, val);
    }

    pub fn set_input_peak_r(&self, val: f32) {
        store(&self.input_peak_r, val);
    }

    pub fn set_output_peak_l(&self, val: f32) {
        store(&self.output_peak_l, val);
    }

    pub fn set_output_peak_r(&self, val: f32) {
        store(&self.output_peak_r, val);
    }

    /// Positive dB of reduction.
    pub fn set_gain_reduction_db(&self, val: f32) {
        store(&self.gain_reduction_db, val);
    }

    pub fn set_momentary_lufs(&self, val: f32) {
        store(&self.momentary_lufs, val);
    }

    pub fn set_ballistic(&self, id: MeterId, current: f32, peak: f32) {
        store(&self.ballistic_current[id.index()], current);
        store(&self.ballistic_peak[id.index()], peak);
    }

    pub fn get_input_peak_l(&self) -> f32 {
        load(&self.input_peak_l)
    }

    pub fn get_input_peak_r(&self) -> f32 {
        load(&self.input_peak_r)
    }

    pub fn get_output_peak_l(&self) -> f32 {
        load(&self.output_peak_l)
    }

    pub fn get_output_peak_r(&self) -> f32 {
        load(&self.output_peak_r)
    }

    pub fn get_gain_reduction_db(&self) -> f32 {
        load(&self.gain_reduction_db)
    }

    pub fn get_momentary_lufs(&self) -> f32 {
        load(&self.momentary_lufs)
    }

    /// `(current, peak)` of a ballistic meter.
    pub fn get_ballistic(&self, id: MeterId) -> (f32, f32) {
        (
            load(&self.ballistic_current[id.index()]),
            load(&self.ballistic_peak[id.index()]),
        )
    }

    /// Zeroes every tap; loudness returns to the -70 LUFS floor.
    pub fn reset(&self) {
        for a in [
            &self.input_peak_l,
            &self.input_peak_r,
            &self.output_peak_l,
            &self.output_peak_r,
            &self.gain_reduction_db,
        ] {
            store(a, 0.0);
        }
        for a in self.ballistic_current.iter().chain(&self.ballistic_peak) {
            store(a, 0.0);
        }
        store(&self.momentary_lufs, LOUDNESS_FLOOR_LUFS);
    }
}
