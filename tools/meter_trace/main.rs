//! Offline meter trace: WAV in, one JSON object per 16 ms meter frame out.
//!
//! ```text
//! meter_trace <input.wav> [--profile NAME | --config FILE] [--bins]
//! ```

use anyhow::{anyhow, bail, Context, Result};
use hound::{SampleFormat, WavReader};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use vxmeter::dsp::utils::{block_peak, lin_to_db, DEFAULT_FRAME_MS};
use vxmeter::dsp::{
    spectrum_channel, DisplayPipeline, MeterBallistics, VoicingDetector, VoicingState,
};
use vxmeter::presets::{MeterProfile, ProfileLibrary};

const FFT_SIZE: usize = 2048;
const HOP: usize = 512;

struct Args {
    input: PathBuf,
    profile: Option<String>,
    config: Option<PathBuf>,
    bins: bool,
}

fn usage() -> anyhow::Error {
    anyhow!("usage: meter_trace <input.wav> [--profile NAME | --config FILE] [--bins]")
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut input = None;
    let mut profile = None;
    let mut config = None;
    let mut bins = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--profile" => profile = Some(args.next().ok_or_else(usage)?),
            "--config" => config = Some(PathBuf::from(args.next().ok_or_else(usage)?)),
            "--bins" => bins = true,
            "-h" | "--help" => return Err(usage()),
            other if other.starts_with("--") => bail!("unknown option '{other}'"),
            other => {
                if input.replace(PathBuf::from(other)).is_some() {
                    return Err(usage());
                }
            }
        }
    }

    if profile.is_some() && config.is_some() {
        bail!("--profile and --config are mutually exclusive");
    }
    Ok(Args {
        input: input.ok_or_else(usage)?,
        profile,
        config,
        bins,
    })
}

fn load_profile(args: &Args) -> Result<MeterProfile> {
    if let Some(path) = &args.config {
        return MeterProfile::from_json_file(path);
    }
    let library = ProfileLibrary::baked();
    match &args.profile {
        Some(name) => library.get(name).cloned().ok_or_else(|| {
            let names: Vec<&str> = library.names().collect();
            anyhow!("unknown profile '{name}' (available: {})", names.join(", "))
        }),
        None => Ok(library.default_profile().clone()),
    }
}

/// Reads a WAV and mixes it to mono. Returns `(samples, sample_rate)`.
fn read_mono(path: &PathBuf) -> Result<(Vec<f32>, u32)> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open WAV '{}'", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, bits @ (16 | 24 | 32)) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<f32>, hound::Error>>()
        }
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, hound::Error>>(),
        (format, bits) => bail!("unsupported WAV format: {bits}-bit {format:?}"),
    }
    .with_context(|| format!("failed to decode WAV '{}'", path.display()))?;

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

#[derive(Serialize)]
struct TraceFrame<'a> {
    time_ms: f32,
    level: f32,
    current: f32,
    peak: f32,
    peak_db: f32,
    voicing: VoicingState,
    floor_db: f32,
    ceiling_db: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    bins: Option<&'a [f32]>,
}

/// Routes `log` output to stderr; warnings show without `RUST_LOG`.
fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("warn");
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn main() -> Result<()> {
    init_logging();
    let args = parse_args()?;
    let profile = load_profile(&args)?;
    let (samples, sample_rate) = read_mono(&args.input)?;
    if sample_rate == 0 {
        bail!("'{}' reports a sample rate of 0", args.input.display());
    }
    let sr = sample_rate as f32;
    log::debug!(
        "[meter_trace] {} samples at {} Hz, profile '{}'",
        samples.len(),
        sample_rate,
        profile.name
    );

    let frame_len = ((sr * DEFAULT_FRAME_MS / 1000.0).round() as usize).max(1);
    let frame_ms = frame_len as f32 * 1000.0 / sr;

    let mut meter = MeterBallistics::new(profile.ballistics);
    let mut voicing = VoicingDetector::new();
    let (mut feed, mut analyzer) = spectrum_channel(FFT_SIZE, HOP)?;
    let mut pipeline = DisplayPipeline::new(analyzer.analysis_bins(), sr, &profile.display);
    let mut display = vec![0.0f32; pipeline.display_bins()];

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for (i, chunk) in samples.chunks(frame_len).enumerate() {
        let state = voicing.classify(chunk);

        feed.push_samples(chunk);
        while let Some(mags) = analyzer.next_frame() {
            display.copy_from_slice(pipeline.process(mags, state));
        }

        let level = block_peak(chunk);
        meter.update(level, frame_ms);

        let (floor_db, ceiling_db) = pipeline.current_window();
        let frame = TraceFrame {
            time_ms: i as f32 * frame_ms,
            level,
            current: meter.current(),
            peak: meter.peak(),
            peak_db: lin_to_db(meter.peak()),
            voicing: state,
            floor_db,
            ceiling_db,
            bins: args.bins.then_some(display.as_slice()),
        };
        serde_json::to_writer(&mut out, &frame).context("failed to write trace frame")?;
        writeln!(out)?;
    }

    out.flush()?;
    if feed.dropped() > 0 {
        log::warn!("[meter_trace] spectrum feed dropped {} samples", feed.dropped());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_reach_a_logger() {
        init_logging();
        // Second call must not panic
        init_logging();
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(log::log_enabled!(log::Level::Warn));
            assert!(!log::log_enabled!(log::Level::Debug));
        }
    }

    #[test]
    fn test_unknown_profile_lists_available() {
        let args = Args {
            input: PathBuf::from("unused.wav"),
            profile: Some("nope".to_string()),
            config: None,
            bins: false,
        };
        let err = load_profile(&args).unwrap_err().to_string();
        assert!(err.contains("Standard"));
    }
}
