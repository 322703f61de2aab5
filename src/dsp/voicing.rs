//! Frame voicing classifier feeding the noise-floor tracker.
//!
//! Cheap time-domain heuristics: RMS gates silence, zero-crossing rate
//! splits voiced from unvoiced. A short hang keeps word gaps from being
//! treated as silence.

use crate::dsp::normalizer::VoicingState;
use crate::dsp::utils::frame_rms;

const SILENCE_RMS: f32 = 0.001;
const UNVOICED_ZCR: f32 = 0.25;
const HANG_FRAMES: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct VoicingDetector {
    last: VoicingState,
    hang: u32,
}

impl VoicingDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&mut self, frame: &[f32]) -> VoicingState {
        let raw = if frame_rms(frame) < SILENCE_RMS {
            VoicingState::Silence
        } else if zero_crossing_rate(frame) > UNVOICED_ZCR {
            VoicingState::Unvoiced
        } else {
            VoicingState::Voiced
        };

        if raw == VoicingState::Silence {
            if self.last != VoicingState::Silence && self.hang > 0 {
                self.hang -= 1;
                return self.last;
            }
        } else {
            self.hang = HANG_FRAMES;
        }

        self.last = raw;
        raw
    }

    pub fn state(&self) -> VoicingState {
        self.last
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Sign changes per sample pair, in `[0, 1]`.
pub fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (frame.len() - 1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, amp: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / 16000.0).sin())
            .collect()
    }

    fn hiss(n: usize) -> Vec<f32> {
        (0..n).map(|i| if i % 2 == 0 { 0.1 } else { -0.1 }).collect()
    }

    #[test]
    fn test_classifies_basic_frames() {
        let mut det = VoicingDetector::new();
        assert_eq!(det.classify(&[0.0; 512]), VoicingState::Silence);
        assert_eq!(det.classify(&tone(200.0, 0.3, 512)), VoicingState::Voiced);
        assert_eq!(det.classify(&hiss(512)), VoicingState::Unvoiced);
    }

    #[test]
    fn test_hang_before_silence() {
        let mut det = VoicingDetector::new();
        det.classify(&tone(200.0, 0.3, 512));
        for _ in 0..HANG_FRAMES {
            assert_eq!(det.classify(&[0.0; 512]), VoicingState::Voiced);
        }
        assert_eq!(det.classify(&[0.0; 512]), VoicingState::Silence);
        assert_eq!(det.state(), VoicingState::Silence);
    }

    #[test]
    fn test_zero_crossing_rate_bounds() {
        assert_eq!(zero_crossing_rate(&[]), 0.0);
        assert_eq!(zero_crossing_rate(&[1.0]), 0.0);
        assert_eq!(zero_crossing_rate(&hiss(101)), 1.0);
        assert_eq!(zero_crossing_rate(&[0.5; 64]), 0.0);
    }
}
