//! Mastering parameter types
//!
//! Parameters are validated once at the API boundary and then trusted by the
//! hot path; the DSP chain never clamps them silently. The parameter hash is
//! part of every cache key and every job identity, so changing any field
//! forces re-processing rather than serving stale chunks.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Mastering preset selection.
///
/// A closed set: presets select the EQ band layout and dynamics tuning in the
/// DSP chain. `Flat` is the bypass preset and must be exact unity gain at any
/// intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteringPreset {
    /// Bypass: unity gain through every stage
    Flat,
    /// Low-shelf lift, softened highs
    Warm,
    /// Presence and air-band lift
    Bright,
    /// Low-end weight plus tighter limiting
    Club,
    /// Mid-band focus for spoken/sung content
    Vocal,
}

impl MasteringPreset {
    /// All presets, for validation and UI listings
    pub fn all_variants() -> &'static [MasteringPreset] {
        &[
            MasteringPreset::Flat,
            MasteringPreset::Warm,
            MasteringPreset::Bright,
            MasteringPreset::Club,
            MasteringPreset::Vocal,
        ]
    }

    /// Parse from the wire/CLI string form
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "flat" | "bypass" => Some(MasteringPreset::Flat),
            "warm" => Some(MasteringPreset::Warm),
            "bright" => Some(MasteringPreset::Bright),
            "club" => Some(MasteringPreset::Club),
            "vocal" => Some(MasteringPreset::Vocal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MasteringPreset::Flat => "flat",
            MasteringPreset::Warm => "warm",
            MasteringPreset::Bright => "bright",
            MasteringPreset::Club => "club",
            MasteringPreset::Vocal => "vocal",
        }
    }
}

impl Default for MasteringPreset {
    fn default() -> Self {
        MasteringPreset::Flat
    }
}

impl std::fmt::Display for MasteringPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full parameter set for one mastering job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParameters {
    /// Preset selecting the DSP tuning
    #[serde(default)]
    pub preset: MasteringPreset,

    /// Processing intensity in [0.0, 1.0]; 0.0 scales every stage to unity
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

fn default_intensity() -> f32 {
    0.5
}

impl Default for ProcessingParameters {
    fn default() -> Self {
        Self {
            preset: MasteringPreset::Flat,
            intensity: default_intensity(),
        }
    }
}

impl ProcessingParameters {
    /// Validate at the boundary. Rejects rather than clamps: a caller sending
    /// intensity 1.7 has a bug that silent clamping would mask.
    pub fn validate(&self) -> Result<()> {
        if !self.intensity.is_finite() {
            return Err(Error::InvalidParameters(format!(
                "intensity must be finite, got {}",
                self.intensity
            )));
        }
        if !(0.0..=1.0).contains(&self.intensity) {
            return Err(Error::InvalidParameters(format!(
                "intensity must be in [0.0, 1.0], got {}",
                self.intensity
            )));
        }
        Ok(())
    }

    /// Stable hash used in cache keys and job identities.
    ///
    /// Uses the exact bit pattern of `intensity`, so any change a caller can
    /// observe changes the key.
    pub fn cache_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.preset.hash(&mut hasher);
        self.intensity.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_range() {
        for intensity in [0.0, 0.25, 0.5, 1.0] {
            let params = ProcessingParameters {
                preset: MasteringPreset::Warm,
                intensity,
            };
            assert!(params.validate().is_ok());
        }
    }

    #[test]
    fn validate_rejects_out_of_range() {
        for intensity in [-0.1, 1.1, f32::NAN, f32::INFINITY] {
            let params = ProcessingParameters {
                preset: MasteringPreset::Warm,
                intensity,
            };
            assert!(params.validate().is_err(), "intensity {}", intensity);
        }
    }

    #[test]
    fn hash_changes_with_intensity() {
        let a = ProcessingParameters {
            preset: MasteringPreset::Warm,
            intensity: 0.5,
        };
        let b = ProcessingParameters {
            preset: MasteringPreset::Warm,
            intensity: 0.6,
        };
        assert_ne!(a.cache_hash(), b.cache_hash());
    }

    #[test]
    fn hash_changes_with_preset() {
        let a = ProcessingParameters {
            preset: MasteringPreset::Warm,
            intensity: 0.5,
        };
        let b = ProcessingParameters {
            preset: MasteringPreset::Bright,
            intensity: 0.5,
        };
        assert_ne!(a.cache_hash(), b.cache_hash());
    }

    #[test]
    fn hash_is_stable_for_equal_params() {
        let a = ProcessingParameters::default();
        let b = ProcessingParameters::default();
        assert_eq!(a.cache_hash(), b.cache_hash());
    }

    #[test]
    fn preset_parse_round_trip() {
        for preset in MasteringPreset::all_variants() {
            assert_eq!(MasteringPreset::parse(preset.as_str()), Some(*preset));
        }
        assert_eq!(MasteringPreset::parse("bypass"), Some(MasteringPreset::Flat));
        assert_eq!(MasteringPreset::parse("nope"), None);
    }
}
