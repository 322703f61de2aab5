pub mod ballistics;
pub mod bin_mapper;
pub mod display_pipeline;
pub mod floor_tracker;
pub mod frame_clock;
pub mod limiter;
pub mod normalizer;
pub mod spectrum;
pub mod utils;
pub mod voicing;

pub use ballistics::{BallisticsConfig, MeterBallistics, MeterDomain, MeterState};
pub use bin_mapper::{BinMapper, BinScale};
pub use display_pipeline::{DisplayConfig, DisplayPipeline};
pub use floor_tracker::AdaptiveFloorTracker;
pub use frame_clock::FrameClock;
pub use limiter::PeakLimiter;
pub use normalizer::{DynamicRangeMode, DynamicRangeNormalizer, VoicingState};
pub use spectrum::{spectrum_channel, SpectrumAnalyzer, SpectrumFeed};
pub use voicing::VoicingDetector;
