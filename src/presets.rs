use anyhow::{Context, Result};
use nih_plug::prelude::Enum;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dsp::{BallisticsConfig, DisplayConfig};

// =============================================================================
// BALLISTICS PRESETS
// =============================================================================

/// Factory timing presets for the level meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[repr(usize)]
pub enum BallisticsPreset {
    #[serde(rename = "Standard")]
    #[name = "Standard"]
    Standard,
    #[serde(rename = "PPM")]
    #[name = "PPM"]
    Ppm,
    #[serde(rename = "Digital")]
    #[name = "Digital"]
    Digital,
    #[serde(rename = "Gain Reduction")]
    #[name = "Gain Reduction"]
    GainReduction,
    #[serde(rename = "Slow")]
    #[name = "Slow"]
    Slow,
}

impl BallisticsPreset {
    pub fn all_presets() -> [BallisticsPreset; 5] {
        [
            BallisticsPreset::Standard,
            BallisticsPreset::Ppm,
            BallisticsPreset::Digital,
            BallisticsPreset::GainReduction,
            BallisticsPreset::Slow,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BallisticsPreset::Standard => "Standard",
            BallisticsPreset::Ppm => "PPM",
            BallisticsPreset::Digital => "Digital",
            BallisticsPreset::GainReduction => "Gain Reduction",
            BallisticsPreset::Slow => "Slow",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BallisticsPreset::Standard => "General purpose quasi-peak with a short hold",
            BallisticsPreset::Ppm => "Broadcast-style PPM: 10 ms integration, slow fall, no hold",
            BallisticsPreset::Digital => "Near sample-peak response with a long hold",
            BallisticsPreset::GainReduction => "Tuned for compressor/limiter reduction readouts",
            BallisticsPreset::Slow => "Heavily averaged, for loudness-style watching",
        }
    }

    pub fn config(&self) -> BallisticsConfig {
        match self {
            BallisticsPreset::Standard => BallisticsConfig::default(),
            BallisticsPreset::Ppm => BallisticsConfig {
                // IEC 60268-10 type II: 24 dB fall in 2.8 s
                peak_attack_ms: 10.0,
                peak_hold_ms: 0.0,
                peak_decay_db_per_sec: 8.6,
                current_smoothing: 0.7,
            },
            BallisticsPreset::Digital => BallisticsConfig {
                peak_attack_ms: 1.0,
                peak_hold_ms: 1000.0,
                peak_decay_db_per_sec: 20.0,
                current_smoothing: 0.3,
            },
            BallisticsPreset::GainReduction => BallisticsConfig {
                peak_attack_ms: 2.0,
                peak_hold_ms: 500.0,
                peak_decay_db_per_sec: 10.0,
                current_smoothing: 0.5,
            },
            BallisticsPreset::Slow => BallisticsConfig {
                peak_attack_ms: 50.0,
                peak_hold_ms: 1500.0,
                peak_decay_db_per_sec: 6.0,
                current_smoothing: 0.85,
            },
        }
    }
}

impl Default for BallisticsPreset {
    fn default() -> Self {
        BallisticsPreset::Standard
    }
}

// =============================================================================
// METER PROFILES
// =============================================================================

/// A named ballistics + display combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterProfile {
    pub name: String,
    #[serde(default)]
    pub ballistics: BallisticsConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl MeterProfile {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read meter profile '{}'", path.display()))?;
        let mut profile: MeterProfile = serde_json::from_str(&text)
            .with_context(|| format!("invalid meter profile '{}'", path.display()))?;
        profile.ballistics = profile.ballistics.sanitized();
        log::debug!("[vxmeter] loaded profile '{}' from {}", profile.name, path.display());
        Ok(profile)
    }
}

impl Default for MeterProfile {
    fn default() -> Self {
        Self {
            name: "Standard".to_string(),
            ballistics: BallisticsConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

#[derive(Debug)]
pub struct ProfileLibrary {
    profiles: Vec<MeterProfile>,
}

static BAKED_PROFILES: Lazy<ProfileLibrary> = Lazy::new(|| {
    let profiles_str = include_str!("../meter_profiles.json");
    match ProfileLibrary::from_json_str(profiles_str) {
        Ok(lib) => lib,
        Err(e) => {
            log::warn!("[vxmeter] baked meter profiles unusable, using fallback: {e:#}");
            ProfileLibrary::default()
        }
    }
});

impl ProfileLibrary {
    /// Profiles compiled into the binary.
    pub fn baked() -> &'static ProfileLibrary {
        &BAKED_PROFILES
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut profiles: Vec<MeterProfile> =
            serde_json::from_str(json).context("failed to parse meter profile list")?;
        if profiles.is_empty() {
            anyhow::bail!("meter profile list is empty");
        }
        for p in profiles.iter_mut() {
            p.ballistics = p.ballistics.sanitized();
        }
        Ok(Self { profiles })
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&MeterProfile> {
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    /// First profile in the list.
    pub fn default_profile(&self) -> &MeterProfile {
        &self.profiles[0]
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileLibrary {
    fn default() -> Self {
        Self {
            profiles: vec![MeterProfile::default()],
        }
    }
}
