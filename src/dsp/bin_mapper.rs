//! Analysis-bin to display-bin reduction.
//!
//! FFT resolution rarely matches the number of columns a display wants. The
//! mapper pre-computes one half-open analysis range per display bin and keeps
//! the loudest magnitude in each range, so narrow peaks survive the
//! reduction. Every range holds at least one analysis bin; where the display
//! is denser than the analysis, neighbouring columns share a bin.

use serde::{Deserialize, Serialize};

/// Frequency spacing of display bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinScale {
    Linear,
    Logarithmic,
}

impl Default for BinScale {
    fn default() -> Self {
        BinScale::Logarithmic
    }
}

#[derive(Debug, Clone)]
pub struct BinMapper {
    ranges: Vec<(usize, usize)>,
    analysis_bins: usize,
}

impl BinMapper {
    pub fn new(
        analysis_bins: usize,
        display_bins: usize,
        scale: BinScale,
        sample_rate: f32,
        min_hz: f32,
        max_hz: f32,
    ) -> Self {
        match scale {
            BinScale::Linear => Self::linear(analysis_bins, display_bins),
            BinScale::Logarithmic => {
                Self::logarithmic(analysis_bins, display_bins, sample_rate, min_hz, max_hz)
            }
        }
    }

    /// Even split of `0..analysis_bins` across the display.
    pub fn linear(analysis_bins: usize, display_bins: usize) -> Self {
        let mut ranges = Vec::with_capacity(display_bins);
        for d in 0..display_bins {
            let start = d * analysis_bins / display_bins;
            let end = (d + 1) * analysis_bins / display_bins;
            ranges.push(bounded_range(start, end, analysis_bins));
        }
        Self {
            ranges,
            analysis_bins,
        }
    }

    /// Geometric spacing between `min_hz` and `max_hz`. `analysis_bins` is
    /// taken as a real FFT's `fft_size / 2 + 1` bins spanning 0..Nyquist.
    pub fn logarithmic(
        analysis_bins: usize,
        display_bins: usize,
        sample_rate: f32,
        min_hz: f32,
        max_hz: f32,
    ) -> Self {
        if analysis_bins < 2 || sample_rate <= 0.0 || !sample_rate.is_finite() {
            return Self::linear(analysis_bins, display_bins);
        }

        let nyquist = sample_rate * 0.5;
        let bin_hz = nyquist / (analysis_bins - 1) as f32;
        let lo_hz = if min_hz.is_finite() && min_hz > 0.0 {
            min_hz.min(nyquist)
        } else {
            bin_hz
        };
        let hi_hz = if max_hz.is_finite() {
            max_hz.min(nyquist).max(lo_hz)
        } else {
            nyquist
        };
        let ratio = hi_hz / lo_hz;

        let mut ranges = Vec::with_capacity(display_bins);
        for d in 0..display_bins {
            let f_lo = lo_hz * ratio.powf(d as f32 / display_bins as f32);
            let f_hi = lo_hz * ratio.powf((d + 1) as f32 / display_bins as f32);
            let start = (f_lo / bin_hz).floor() as usize;
            let end = (f_hi / bin_hz).ceil() as usize;
            ranges.push(bounded_range(start, end, analysis_bins));
        }
        Self {
            ranges,
            analysis_bins,
        }
    }

    /// Reduces one analysis frame into `out` (peak per range). Display bins
    /// past the end of `analysis` or `out` are left as 0 / untouched.
    pub fn map(&self, analysis: &[f32], out: &mut [f32]) {
        for (o, &(start, end)) in out.iter_mut().zip(&self.ranges) {
            let end = end.min(analysis.len());
            *o = if start < end {
                analysis[start..end]
                    .iter()
                    .fold(0.0f32, |acc, &v| acc.max(v))
            } else {
                0.0
            };
        }
    }

    pub fn display_bins(&self) -> usize {
        self.ranges.len()
    }

    pub fn analysis_bins(&self) -> usize {
        self.analysis_bins
    }

    /// Analysis range feeding display bin `d`.
    pub fn range(&self, d: usize) -> Option<(usize, usize)> {
        self.ranges.get(d).copied()
    }
}

fn bounded_range(start: usize, end: usize, analysis_bins: usize) -> (usize, usize) {
    if analysis_bins == 0 {
        return (0, 0);
    }
    let start = start.min(analysis_bins - 1);
    let end = end.max(start + 1).min(analysis_bins);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_covers_every_bin_once() {
        let mapper = BinMapper::linear(16, 4);
        let mut next = 0;
        for d in 0..4 {
            let (s, e) = mapper.range(d).unwrap();
            assert_eq!(s, next);
            assert!(e > s);
            next = e;
        }
        assert_eq!(next, 16);
    }

    #[test]
    fn test_upsampling_never_leaves_empty_ranges() {
        let mapper = BinMapper::linear(4, 10);
        for d in 0..10 {
            let (s, e) = mapper.range(d).unwrap();
            assert!(e > s && e <= 4);
        }
    }

    #[test]
    fn test_map_keeps_peaks() {
        let mapper = BinMapper::linear(8, 2);
        let analysis = [0.1, 0.9, 0.2, 0.3, 0.0, 0.05, 0.6, 0.1];
        let mut out = [0.0; 2];
        mapper.map(&analysis, &mut out);
        assert_eq!(out, [0.9, 0.6]);
    }

    #[test]
    fn test_log_ranges_widen_with_frequency() {
        let mapper = BinMapper::logarithmic(1025, 32, 48000.0, 40.0, 16000.0);
        let first = mapper.range(0).unwrap();
        let last = mapper.range(31).unwrap();
        assert!(last.1 - last.0 > first.1 - first.0);
        // 40 Hz at 23.4 Hz per bin starts at bin 1
        assert_eq!(first.0, 1);
        // 16 kHz lands at bin ~683
        assert!(last.1 >= 682 && last.1 <= 684);
    }

    #[test]
    fn test_log_ranges_are_monotonic() {
        let mapper = BinMapper::logarithmic(513, 200, 44100.0, 20.0, 20000.0);
        let mut prev = 0;
        for d in 0..200 {
            let (s, e) = mapper.range(d).unwrap();
            assert!(s >= prev);
            assert!(e > s && e <= 513);
            prev = s;
        }
    }

    #[test]
    fn test_short_analysis_frame() {
        let mapper = BinMapper::linear(8, 4);
        let mut out = [1.0; 4];
        mapper.map(&[0.5, 0.25, 0.75], &mut out);
        assert_eq!(out, [0.5, 0.75, 0.0, 0.0]);
    }

    #[test]
    fn test_degenerate_inputs_fall_back_to_linear() {
        let mapper = BinMapper::new(1, 3, BinScale::Logarithmic, 48000.0, 20.0, 20000.0);
        assert_eq!(mapper.display_bins(), 3);
        let mapper = BinMapper::logarithmic(64, 8, 0.0, 20.0, 20000.0);
        assert_eq!(mapper.range(7), Some((56, 64)));
        let empty = BinMapper::linear(0, 2);
        let mut out = [1.0; 2];
        empty.map(&[], &mut out);
        assert_eq!(out, [0.0, 0.0]);
    }
}
