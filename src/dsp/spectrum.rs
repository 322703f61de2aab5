//! STFT magnitude front-end for the spectrum display.
//!
//! The audio side pushes raw samples into a lock-free SPSC ring; the render
//! side pulls one magnitude frame per hop. Nothing allocates after
//! [`spectrum_channel`] returns.
//!
//! Magnitudes are linear and scaled by `2 / sum(window)`, so a full-scale
//! sine centred on a bin reads ~1.0.

use anyhow::{bail, Result};
use ringbuf::{Consumer, Producer, RingBuffer};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::dsp::utils::make_hann_window;

const RINGBUF_CAP_MULT: usize = 4;
const MIN_FFT_SIZE: usize = 64;

/// Creates the audio-side feed and the render-side analyzer.
///
/// * `fft_size` - power of two, at least 64
/// * `hop` - samples between frames, `1..=fft_size`
pub fn spectrum_channel(fft_size: usize, hop: usize) -> Result<(SpectrumFeed, SpectrumAnalyzer)> {
    if fft_size < MIN_FFT_SIZE || !fft_size.is_power_of_two() {
        bail!("FFT size {fft_size} must be a power of two >= {MIN_FFT_SIZE}");
    }
    if hop == 0 || hop > fft_size {
        bail!("hop {hop} must be within 1..={fft_size}");
    }

    let (producer, consumer) = RingBuffer::<f32>::new(fft_size * RINGBUF_CAP_MULT).split();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);
    let fft_scratch_len = fft.get_inplace_scratch_len();

    let window = make_hann_window(fft_size);
    let window_sum: f32 = window.iter().sum();

    let feed = SpectrumFeed {
        producer,
        dropped: 0,
    };
    let analyzer = SpectrumAnalyzer {
        consumer,
        fft,
        scratch: vec![Complex::default(); fft_size],
        fft_scratch: vec![Complex::default(); fft_scratch_len],
        window,
        magnitudes: vec![0.0; fft_size / 2 + 1],
        mag_scale: 2.0 / window_sum.max(1e-12),
        fft_size,
        hop,
    };
    Ok((feed, analyzer))
}

// -----------------------------------------------------------------------------
// Audio side
// -----------------------------------------------------------------------------

pub struct SpectrumFeed {
    producer: Producer<f32>,
    dropped: usize,
}

impl SpectrumFeed {
    /// Queues samples; anything that does not fit is dropped.
    /// Returns how many were accepted.
    #[inline]
    pub fn push_samples(&mut self, samples: &[f32]) -> usize {
        let mut accepted = 0;
        for &s in samples {
            if self.producer.push(s).is_err() {
                break;
            }
            accepted += 1;
        }
        self.dropped += samples.len() - accepted;
        accepted
    }

    /// Total samples dropped because the analyzer fell behind.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

// -----------------------------------------------------------------------------
// Render side
// -----------------------------------------------------------------------------

pub struct SpectrumAnalyzer {
    consumer: Consumer<f32>,
    fft: Arc<dyn Fft<f32>>,

    // Scratch
    scratch: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    magnitudes: Vec<f32>,

    mag_scale: f32,
    fft_size: usize,
    hop: usize,
}

impl SpectrumAnalyzer {
    /// Computes the next frame if a full window is queued, then advances by
    /// one hop. Call in a loop to drain.
    pub fn next_frame(&mut self) -> Option<&[f32]> {
        if self.consumer.len() < self.fft_size {
            return None;
        }

        // 1) Window (iter() does not consume)
        for (i, &s) in self.consumer.iter().take(self.fft_size).enumerate() {
            self.scratch[i] = Complex::new(s * self.window[i], 0.0);
        }

        // 2) FFT
        self.fft
            .process_with_scratch(&mut self.scratch, &mut self.fft_scratch);

        // 3) Positive-frequency magnitudes
        for (m, c) in self.magnitudes.iter_mut().zip(&self.scratch) {
            *m = c.norm() * self.mag_scale;
        }

        // 4) Advance
        for _ in 0..self.hop {
            let _ = self.consumer.pop();
        }

        Some(&self.magnitudes)
    }

    /// Samples queued but not yet consumed.
    pub fn pending_samples(&self) -> usize {
        self.consumer.len()
    }

    /// Drops queued audio and the last frame.
    pub fn reset(&mut self) {
        while self.consumer.pop().is_some() {}
        self.magnitudes.fill(0.0);
    }

    /// `fft_size / 2 + 1`
    pub fn analysis_bins(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop(&self) -> usize {
        self.hop
    }
}
