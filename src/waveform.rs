//! Ring of recent mono samples for the waveform display.
//!
//! The audio thread writes with [`WaveformBuffer::try_write`], which skips
//! the block instead of waiting if the UI holds the lock. The UI side copies
//! out with `snapshot` or reduces to per-column peaks.

use std::sync::{Mutex, MutexGuard};

struct Ring {
    samples: Vec<f32>,
    /// Next write position.
    pos: usize,
    /// Samples written so far, saturating at capacity.
    filled: usize,
}

impl Ring {
    fn write(&mut self, input: &[f32]) {
        let cap = self.samples.len();
        if cap == 0 {
            return;
        }
        // Only the tail of an oversized block can survive
        let input = &input[input.len().saturating_sub(cap)..];
        for &s in input {
            self.samples[self.pos] = if s.is_finite() { s } else { 0.0 };
            self.pos = (self.pos + 1) % cap;
        }
        self.filled = (self.filled + input.len()).min(cap);
    }

    /// Index of the oldest valid sample.
    fn start(&self) -> usize {
        let cap = self.samples.len();
        (self.pos + cap - self.filled) % cap.max(1)
    }

    fn get(&self, i: usize) -> f32 {
        self.samples[(self.start() + i) % self.samples.len()]
    }
}

pub struct WaveformBuffer {
    ring: Mutex<Ring>,
    capacity: usize,
}

impl WaveformBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                samples: vec![0.0; capacity],
                pos: 0,
                filled: 0,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocking write. Not for the audio thread.
    pub fn write(&self, input: &[f32]) {
        self.lock().write(input);
    }

    /// Non-blocking write. Returns `false` if the lock was busy and the
    /// block was skipped.
    pub fn try_write(&self, input: &[f32]) -> bool {
        use std::sync::TryLockError;
        let mut ring = match self.ring.try_lock() {
            Ok(g) => g,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        ring.write(input);
        true
    }

    /// Copies the most recent `out.len()` samples, oldest first. Returns how
    /// many were written; the rest of `out` is untouched.
    pub fn snapshot(&self, out: &mut [f32]) -> usize {
        let ring = self.lock();
        let n = out.len().min(ring.filled);
        let skip = ring.filled - n;
        for (i, o) in out[..n].iter_mut().enumerate() {
            *o = ring.get(skip + i);
        }
        n
    }

    /// Absolute peak per display column over everything written so far.
    /// Columns with no samples read 0.
    pub fn column_peaks(&self, out: &mut [f32]) {
        let ring = self.lock();
        let cols = out.len();
        if cols == 0 {
            return;
        }
        for (c, o) in out.iter_mut().enumerate() {
            let start = c * ring.filled / cols;
            let end = (c + 1) * ring.filled / cols;
            *o = (start..end).fold(0.0f32, |acc, i| acc.max(ring.get(i).abs()));
        }
    }

    pub fn len(&self) -> usize {
        self.lock().filled
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut ring = self.lock();
        ring.samples.fill(0.0);
        ring.pos = 0;
        ring.filled = 0;
    }
}
