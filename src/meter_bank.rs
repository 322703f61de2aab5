//! The plugin's set of ballistic meters.
//!
//! Four linear level meters (input/output, L/R) and one gain-reduction meter
//! in dB. The audio side writes raw per-block peaks into [`Meters`]; the bank
//! turns those into `current`/`peak` display values, either with an explicit
//! frame step (`advance`) or with its own wall clock (`tick`).

use serde::{Deserialize, Serialize};

use crate::dsp::{BallisticsConfig, FrameClock, MeterBallistics};
use crate::meters::{MeterId, Meters};

/// Raw levels for one meter frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterFrame {
    pub input_l: f32,
    pub input_r: f32,
    pub output_l: f32,
    pub output_r: f32,
    /// Positive dB of reduction.
    pub gain_reduction_db: f32,
}

impl MeterFrame {
    pub fn from_meters(meters: &Meters) -> Self {
        Self {
            input_l: meters.get_input_peak_l(),
            input_r: meters.get_input_peak_r(),
            output_l: meters.get_output_peak_l(),
            output_r: meters.get_output_peak_r(),
            gain_reduction_db: meters.get_gain_reduction_db(),
        }
    }

    fn value(&self, id: MeterId) -> f32 {
        match id {
            MeterId::InputL => self.input_l,
            MeterId::InputR => self.input_r,
            MeterId::OutputL => self.output_l,
            MeterId::OutputR => self.output_r,
            MeterId::GainReduction => self.gain_reduction_db,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterLevel {
    pub current: f32,
    pub peak: f32,
}

/// Display values after one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterReadout {
    pub input_l: MeterLevel,
    pub input_r: MeterLevel,
    pub output_l: MeterLevel,
    pub output_r: MeterLevel,
    pub gain_reduction: MeterLevel,
}

impl MeterReadout {
    pub fn level(&self, id: MeterId) -> MeterLevel {
        match id {
            MeterId::InputL => self.input_l,
            MeterId::InputR => self.input_r,
            MeterId::OutputL => self.output_l,
            MeterId::OutputR => self.output_r,
            MeterId::GainReduction => self.gain_reduction,
        }
    }

    fn level_mut(&mut self, id: MeterId) -> &mut MeterLevel {
        match id {
            MeterId::InputL => &mut self.input_l,
            MeterId::InputR => &mut self.input_r,
            MeterId::OutputL => &mut self.output_l,
            MeterId::OutputR => &mut self.output_r,
            MeterId::GainReduction => &mut self.gain_reduction,
        }
    }
}

pub struct MeterBank {
    meters: [MeterBallistics; 5],
    clock: FrameClock,
}

impl MeterBank {
    /// `level` drives the four level meters, `gain_reduction` the GR meter.
    pub fn new(level: BallisticsConfig, gain_reduction: BallisticsConfig) -> Self {
        let mut bank = Self {
            meters: Default::default(),
            clock: FrameClock::new(),
        };
        bank.set_configs(level, gain_reduction);
        bank
    }

    /// Swaps timing constants; displayed levels carry over.
    pub fn set_configs(&mut self, level: BallisticsConfig, gain_reduction: BallisticsConfig) {
        for id in MeterId::ALL {
            let config = if id == MeterId::GainReduction {
                gain_reduction
            } else {
                level
            };
            self.meters[id.index()].set_config(config);
        }
    }

    /// Steps every meter by `delta_ms` (`0` = no history).
    pub fn advance(&mut self, frame: &MeterFrame, delta_ms: f32) -> MeterReadout {
        let mut readout = MeterReadout::default();
        for id in MeterId::ALL {
            let meter = &mut self.meters[id.index()];
            if id == MeterId::GainReduction {
                meter.update_db(frame.value(id), delta_ms);
            } else {
                meter.update(frame.value(id), delta_ms);
            }
            *readout.level_mut(id) = MeterLevel {
                current: meter.current(),
                peak: meter.peak(),
            };
        }
        readout
    }

    /// Reads the raw taps and steps by the wall-clock time since the last
    /// tick. For UI loops that do not track frame time themselves.
    pub fn tick(&mut self, meters: &Meters) -> MeterReadout {
        let delta_ms = self.clock.tick();
        self.advance(&MeterFrame::from_meters(meters), delta_ms)
    }

    /// Writes ballistic values back to the shared taps.
    pub fn publish(readout: &MeterReadout, meters: &Meters) {
        for id in MeterId::ALL {
            let level = readout.level(id);
            meters.set_ballistic(id, level.current, level.peak);
        }
    }

    pub fn meter(&self, id: MeterId) -> &MeterBallistics {
        &self.meters[id.index()]
    }

    /// "Clear meters".
    pub fn reset(&mut self) {
        for m in self.meters.iter_mut() {
            m.reset();
        }
        self.clock.reset();
    }
}

impl Default for MeterBank {
    fn default() -> Self {
        Self::new(BallisticsConfig::default(), BallisticsConfig::default())
    }
}
