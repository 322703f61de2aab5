mod debug;
pub mod dsp;
pub mod meter_bank;
pub mod meters;
pub mod presets;
pub mod waveform;

use crate::dsp::PeakLimiter;
use crate::meter_bank::{MeterBank, MeterFrame};
use crate::meters::Meters;
use crate::presets::BallisticsPreset;
use crate::waveform::WaveformBuffer;
use assert_no_alloc::permit_alloc;
use ebur128::{EbuR128, Mode};
use nih_plug::prelude::*;
use std::sync::Arc;

const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Meter frame driven from the sample count (~60 Hz).
const METER_FRAME_MS: f32 = 16.0;

/// Samples kept for the waveform view (~1.4 s at 48 kHz).
const WAVEFORM_CAPACITY: usize = 1 << 16;

// Helper to format gain in dB
fn format_db(v: f32) -> String {
    format!("{:.1} dB", v)
}

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------

#[derive(Params)]
pub struct VxMeterParams {
    #[id = "ceiling"]
    pub ceiling_db: FloatParam,

    #[id = "meter_preset"]
    pub meter_preset: EnumParam<BallisticsPreset>,

    #[id = "reset_meters"]
    pub reset_meters: BoolParam,
}

impl Default for VxMeterParams {
    fn default() -> Self {
        Self {
            ceiling_db: FloatParam::new(
                "Ceiling",
                -1.0,
                FloatRange::Linear {
                    min: -24.0,
                    max: 0.0,
                },
            )
            .with_value_to_string(Arc::new(format_db))
            .with_smoother(SmoothingStyle::Linear(20.0)),

            meter_preset: EnumParam::new("Meter Ballistics", BallisticsPreset::Standard),

            reset_meters: BoolParam::new("Clear Meters", false).non_automatable(),
        }
    }
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------

pub struct VxMeterPlugin {
    params: Arc<VxMeterParams>,
    meters: Arc<Meters>,
    waveform: Arc<WaveformBuffer>,
    sample_rate: f32,
    max_supported_block_size: usize,

    limiter: PeakLimiter,
    meter_bank: MeterBank,
    last_preset: BallisticsPreset,

    // Meter frame accumulation
    frame_len_samples: usize,
    frame_pos: usize,
    frame_peaks: MeterFrame,

    loudness_meter: Option<EbuR128>,
    interleaved_buffer: Vec<f32>,
    mono_buffer: Vec<f32>,
}

impl Default for VxMeterPlugin {
    fn default() -> Self {
        let preset = BallisticsPreset::Standard;
        Self {
            params: Arc::new(VxMeterParams::default()),
            meters: Arc::new(Meters::new()),
            waveform: Arc::new(WaveformBuffer::new(WAVEFORM_CAPACITY)),
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_supported_block_size: 0,

            limiter: PeakLimiter::new(DEFAULT_SAMPLE_RATE),
            meter_bank: MeterBank::new(preset.config(), BallisticsPreset::GainReduction.config()),
            last_preset: preset,

            frame_len_samples: meter_frame_len(DEFAULT_SAMPLE_RATE),
            frame_pos: 0,
            frame_peaks: MeterFrame::default(),

            loudness_meter: None,
            interleaved_buffer: Vec::new(),
            mono_buffer: Vec::new(),
        }
    }
}

fn meter_frame_len(sample_rate: f32) -> usize {
    ((sample_rate * METER_FRAME_MS / 1000.0).round() as usize).max(1)
}

impl Plugin for VxMeterPlugin {
    const NAME: &'static str = "VxMeter";
    const VENDOR: &'static str = "Andrzej Marczewski";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = "0.1.0";

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(2),
        main_output_channels: NonZeroU32::new(2),
        ..AudioIOLayout::const_default()
    }];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        #[cfg(feature = "debug")]
        crate::debug::logger::init_logger();

        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.prepare(
                buffer_config.sample_rate,
                buffer_config.max_buffer_size as usize,
            );

            #[cfg(feature = "debug")]
            crate::debug::logger::drain_to_file();

            true
        }))
        .unwrap_or(false)
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.process_internal(buffer)))
            .unwrap_or(ProcessStatus::Normal)
    }

    fn reset(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.limiter.reset();
            self.clear_meters();
            self.recreate_loudness_meter();

            #[cfg(feature = "debug")]
            crate::debug::logger::drain_to_file();
        }))
        .unwrap_or(());
    }
}

impl VxMeterPlugin {
    /// Shared meter taps, for an editor or host-side display.
    pub fn meters(&self) -> Arc<Meters> {
        self.meters.clone()
    }

    pub fn waveform(&self) -> Arc<WaveformBuffer> {
        self.waveform.clone()
    }

    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.max_supported_block_size = max_block_size;
        self.limiter.set_sample_rate(sample_rate);
        self.frame_len_samples = meter_frame_len(sample_rate);
        self.params
            .ceiling_db
            .smoothed
            .reset(self.params.ceiling_db.value());

        self.interleaved_buffer = permit_alloc(|| vec![0.0; max_block_size * 2]);
        self.mono_buffer = permit_alloc(|| vec![0.0; max_block_size]);
        self.recreate_loudness_meter();
        self.clear_meters();

        crate::vm_log!(
            "[vxmeter] prepared: sr={} block={} meter_frame={} samples",
            sample_rate,
            max_block_size,
            self.frame_len_samples
        );
    }

    fn recreate_loudness_meter(&mut self) {
        permit_alloc(|| {
            self.loudness_meter = EbuR128::new(2, self.sample_rate as u32, Mode::M).ok();
        });
    }

    /// "Clear meters": ballistics, raw taps and the partial frame.
    fn clear_meters(&mut self) {
        self.meter_bank.reset();
        self.meters.reset();
        self.frame_pos = 0;
        self.frame_peaks = MeterFrame::default();
    }

    fn process_internal(&mut self, buffer: &mut Buffer) -> ProcessStatus {
        let channels = buffer.as_slice();
        if channels.len() < 2 {
            return ProcessStatus::Normal;
        }
        let (first_channel, remaining) = channels.split_at_mut(1);
        let (Some(left), Some(right)) = (first_channel.get_mut(0), remaining.get_mut(0)) else {
            return ProcessStatus::Normal;
        };
        self.process_block(left, right);
        ProcessStatus::Normal
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.params.reset_meters.value() {
            self.clear_meters();
        }

        let preset = self.params.meter_preset.value();
        if preset != self.last_preset {
            self.meter_bank
                .set_configs(preset.config(), BallisticsPreset::GainReduction.config());
            self.last_preset = preset;
            crate::vm_log!("[vxmeter] meter preset -> {}", preset.name());
        }

        let frame_count = left.len().min(right.len());
        let frame_delta_ms = self.frame_len_samples as f32 * 1000.0 / self.sample_rate;

        for idx in 0..frame_count {
            let input_l = left[idx];
            let input_r = right[idx];

            let ceiling_db = self.params.ceiling_db.smoothed.next();
            let (out_l, out_r) = self.limiter.process(input_l, input_r, ceiling_db);
            left[idx] = out_l;
            right[idx] = out_r;

            let p = &mut self.frame_peaks;
            p.input_l = p.input_l.max(input_l.abs());
            p.input_r = p.input_r.max(input_r.abs());
            p.output_l = p.output_l.max(out_l.abs());
            p.output_r = p.output_r.max(out_r.abs());
            p.gain_reduction_db = p
                .gain_reduction_db
                .max(self.limiter.get_gain_reduction_db());

            if idx < self.mono_buffer.len() {
                self.mono_buffer[idx] = 0.5 * (out_l + out_r);
            }
            let idx2 = idx * 2;
            if idx2 + 1 < self.interleaved_buffer.len() {
                self.interleaved_buffer[idx2] = out_l;
                self.interleaved_buffer[idx2 + 1] = out_r;
            }

            self.frame_pos += 1;
            if self.frame_pos >= self.frame_len_samples {
                self.finish_meter_frame(frame_delta_ms);
            }
        }

        // Loudness + waveform (skipped for blocks larger than announced)
        if frame_count <= self.max_supported_block_size {
            if let Some(meter) = self.loudness_meter.as_mut() {
                if meter
                    .add_frames_f32(&self.interleaved_buffer[..frame_count * 2])
                    .is_ok()
                {
                    let lufs = meter.loudness_momentary().unwrap_or(f64::NEG_INFINITY) as f32;
                    if lufs.is_finite() {
                        self.meters.set_momentary_lufs(lufs);
                    }
                }
            }
            let _ = self.waveform.try_write(&self.mono_buffer[..frame_count]);
        }
    }

    fn finish_meter_frame(&mut self, delta_ms: f32) {
        let frame = self.frame_peaks;
        self.meters.set_input_peak_l(frame.input_l);
        self.meters.set_input_peak_r(frame.input_r);
        self.meters.set_output_peak_l(frame.output_l);
        self.meters.set_output_peak_r(frame.output_r);
        self.meters.set_gain_reduction_db(frame.gain_reduction_db);

        let readout = self.meter_bank.advance(&frame, delta_ms);
        MeterBank::publish(&readout, &self.meters);

        self.frame_pos = 0;
        self.frame_peaks = MeterFrame::default();
    }
}

impl ClapPlugin for VxMeterPlugin {
    const CLAP_ID: &'static str = "com.andrzej.vxmeter";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Ballistic level, gain-reduction and loudness metering");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Analyzer,
        ClapFeature::Stereo,
    ];
}

impl Vst3Plugin for VxMeterPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"VxMeterAnalyzer1";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Analyzer];
}

nih_export_clap!(VxMeterPlugin);
nih_export_vst3!(VxMeterPlugin);
