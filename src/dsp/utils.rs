//! Shared numeric helpers for the metering and display paths.
//!
//! Everything here is branch-light and allocation-free so it can be called
//! from both the audio callback and the render thread.

/// Level reported for zero / negative / non-finite linear input.
pub const SILENCE_DB: f32 = -100.0;

/// Nominal UI frame used when a caller has no timing history (~60 Hz).
pub const DEFAULT_FRAME_MS: f32 = 16.0;

/// Smallest and largest frame step the ballistics will integrate over.
pub const MIN_FRAME_MS: f32 = 1.0;
pub const MAX_FRAME_MS: f32 = 100.0;

/// Linear amplitude to dBFS. Non-positive and non-finite input maps to
/// [`SILENCE_DB`] instead of `-inf`/NaN.
#[inline]
pub fn lin_to_db(x: f32) -> f32 {
    if x > 0.0 && x.is_finite() {
        20.0 * x.log10()
    } else {
        SILENCE_DB
    }
}

#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    (10.0f32).powf(db / 20.0)
}

/// One-pole smoothing coefficient for a step of `delta_ms` against a time
/// constant of `tau_ms`: `1 - e^(-dt/tau)`.
#[inline]
pub fn frame_coeff(delta_ms: f32, tau_ms: f32) -> f32 {
    1.0 - (-delta_ms / tau_ms.max(1e-3)).exp()
}

/// Per-sample one-pole coefficient for a time constant in ms.
#[inline]
pub fn time_constant_coeff(ms: f32, sample_rate: f32) -> f32 {
    let samples = (ms * 0.001 * sample_rate).max(1.0);
    (-1.0 / samples).exp()
}

/// Resolves a caller-supplied frame step: missing history (`<= 0`) or junk
/// becomes [`DEFAULT_FRAME_MS`], then the result is held to
/// `[MIN_FRAME_MS, MAX_FRAME_MS]`.
#[inline]
pub fn resolve_delta_ms(delta_ms: f32) -> f32 {
    let dt = if delta_ms > 0.0 && delta_ms.is_finite() {
        delta_ms
    } else {
        DEFAULT_FRAME_MS
    };
    dt.clamp(MIN_FRAME_MS, MAX_FRAME_MS)
}

/// Meter input guard: NaN/inf read as silence, negatives clamp to zero.
#[inline]
pub fn sanitize_level(x: f32) -> f32 {
    if x.is_finite() {
        x.max(0.0)
    } else {
        0.0
    }
}

/// Absolute peak of a block.
pub fn block_peak(x: &[f32]) -> f32 {
    x.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()))
}

pub fn frame_rms(x: &[f32]) -> f32 {
    let mut s = 0.0f32;
    for &v in x {
        s += v * v;
    }
    (s / (x.len().max(1) as f32)).sqrt()
}

/// Periodic Hann window of length `n`.
pub fn make_hann_window(n: usize) -> Vec<f32> {
    let mut w = vec![0.0; n];
    if n == 0 {
        return w;
    }
    for (i, v) in w.iter_mut().enumerate() {
        let phase = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
        *v = 0.5 - 0.5 * phase.cos();
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lin_to_db_floors_silence() {
        assert_eq!(lin_to_db(0.0), SILENCE_DB);
        assert_eq!(lin_to_db(-1.0), SILENCE_DB);
        assert_eq!(lin_to_db(f32::NAN), SILENCE_DB);
        assert!((lin_to_db(1.0)).abs() < 1e-6);
        assert!((lin_to_db(0.1) + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_resolve_delta() {
        assert_eq!(resolve_delta_ms(0.0), DEFAULT_FRAME_MS);
        assert_eq!(resolve_delta_ms(f32::NAN), DEFAULT_FRAME_MS);
        assert_eq!(resolve_delta_ms(0.2), MIN_FRAME_MS);
        assert_eq!(resolve_delta_ms(5000.0), MAX_FRAME_MS);
        assert_eq!(resolve_delta_ms(33.0), 33.0);
    }

    #[test]
    fn test_frame_coeff_range() {
        let c = frame_coeff(16.0, 50.0);
        assert!(c > 0.0 && c < 1.0);
        assert!((c - (1.0 - (-16.0f32 / 50.0).exp())).abs() < 1e-6);
    }

    #[test]
    fn test_hann_window_shape() {
        let w = make_hann_window(8);
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }
}
