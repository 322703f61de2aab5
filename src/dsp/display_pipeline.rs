//! Spectrum display pipeline: analysis magnitudes in, `[0, 1]` columns out.
//!
//! Two stages, both with buffers sized at construction:
//! 1. [`BinMapper`] reduces analysis bins to display bins (peak per range).
//! 2. [`DynamicRangeNormalizer`] maps each display bin through the active
//!    dB window.

use serde::{Deserialize, Serialize};

use crate::dsp::bin_mapper::{BinMapper, BinScale};
use crate::dsp::normalizer::{DynamicRangeMode, DynamicRangeNormalizer, VoicingState};

/// Display-side settings, serialisable as part of a meter profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub display_bins: usize,
    pub min_db: f32,
    pub max_db: f32,
    pub mode: DynamicRangeMode,
    pub scale: BinScale,
    pub min_hz: f32,
    pub max_hz: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            display_bins: 128,
            min_db: -100.0,
            max_db: 0.0,
            mode: DynamicRangeMode::VoiceOptimized,
            scale: BinScale::Logarithmic,
            min_hz: 40.0,
            max_hz: 16000.0,
        }
    }
}

pub struct DisplayPipeline {
    mapper: BinMapper,
    normalizer: DynamicRangeNormalizer,
    display_scratch: Vec<f32>,
}

impl DisplayPipeline {
    pub fn new(analysis_bins: usize, sample_rate: f32, config: &DisplayConfig) -> Self {
        let mapper = BinMapper::new(
            analysis_bins,
            config.display_bins,
            config.scale,
            sample_rate,
            config.min_hz,
            config.max_hz,
        );
        Self {
            mapper,
            normalizer: DynamicRangeNormalizer::new(
                config.display_bins,
                config.min_db,
                config.max_db,
                config.mode,
            ),
            display_scratch: vec![0.0; config.display_bins],
        }
    }

    /// Maps and normalizes one analysis frame.
    pub fn process(&mut self, analysis_magnitudes: &[f32], voicing: VoicingState) -> &[f32] {
        self.mapper
            .map(analysis_magnitudes, &mut self.display_scratch);
        self.normalizer.normalize(&self.display_scratch, voicing)
    }

    /// Returns whether the adaptive floor was discarded.
    pub fn update_processing(&mut self, min_db: f32, max_db: f32, mode: DynamicRangeMode) -> bool {
        self.normalizer.update_processing(min_db, max_db, mode)
    }

    pub fn reset(&mut self) {
        self.display_scratch.fill(0.0);
        self.normalizer.reset();
    }

    /// dB window used by the last frame (for axis labels).
    pub fn current_window(&self) -> (f32, f32) {
        self.normalizer.current_window()
    }

    pub fn display_bins(&self) -> usize {
        self.display_scratch.len()
    }

    pub fn analysis_bins(&self) -> usize {
        self.mapper.analysis_bins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::utils::db_to_lin;

    #[test]
    fn test_pipeline_maps_then_normalizes() {
        let config = DisplayConfig {
            display_bins: 4,
            mode: DynamicRangeMode::Compressed,
            scale: BinScale::Linear,
            ..DisplayConfig::default()
        };
        let mut pipeline = DisplayPipeline::new(16, 48000.0, &config);
        let mut analysis = vec![0.0f32; 16];
        analysis[1] = db_to_lin(-30.0);
        analysis[9] = db_to_lin(-6.0);

        let out = pipeline.process(&analysis, VoicingState::Voiced).to_vec();
        assert_eq!(out.len(), 4);
        assert!((out[0] - 0.5).abs() < 1e-4);
        assert_eq!(out[1], 0.0);
        assert!((out[2] - 0.9).abs() < 1e-4);
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn test_pipeline_forwards_reconfiguration() {
        let config = DisplayConfig {
            display_bins: 8,
            mode: DynamicRangeMode::NoiseFloor,
            ..DisplayConfig::default()
        };
        let mut pipeline = DisplayPipeline::new(513, 44100.0, &config);
        assert!(!pipeline.update_processing(-100.0, 0.0, DynamicRangeMode::NoiseFloor));
        assert!(pipeline.update_processing(-100.0, 0.0, DynamicRangeMode::Full));

        pipeline.process(&vec![db_to_lin(-50.0); 513], VoicingState::Silence);
        assert_eq!(pipeline.current_window(), (-120.0, 0.0));
    }

    #[test]
    fn test_default_config_round_trips_through_json() {
        let json = serde_json::to_string(&DisplayConfig::default()).unwrap();
        let parsed: DisplayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, DisplayConfig::default());

        // Missing fields fall back to defaults
        let partial: DisplayConfig = serde_json::from_str(r#"{"display_bins": 64}"#).unwrap();
        assert_eq!(partial.display_bins, 64);
        assert_eq!(partial.mode, DynamicRangeMode::VoiceOptimized);
    }
}
