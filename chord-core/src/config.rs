//! # Engine Configuration
//!
//! Tunable parameters for onset gating and analysis. The defaults are the
//! values that worked best for a nylon-strung baritone instrument in a quiet
//! room; they are meant to be overridden per instrument and environment,
//! usually from a TOML file:
//!
//! ```toml
//! tuning = "baritone"
//!
//! [onset]
//! flux_threshold = 0.015
//! min_amplitude = 0.08
//! latch_delay_ms = 200
//! cooldown_ms = 400
//!
//! [analysis]
//! window_size = 8192
//! confidence_floor = 0.6
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AnalysisError, Result};
use crate::tuning::Tuning;

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub onset: OnsetConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub tuning: Tuning,
    /// Number of recent samples kept for snapshots (~1 s at 48 kHz).
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
}

/// Strum onset gating parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsetConfig {
    /// Minimum rise in amplitude between two callbacks to count as an attack.
    #[serde(default = "default_flux_threshold")]
    pub flux_threshold: f32,
    /// Amplitude gate; quieter callbacks never trigger.
    #[serde(default = "default_min_amplitude")]
    pub min_amplitude: f32,
    /// Wait after the attack before the snapshot is taken, so overtones bloom.
    #[serde(default = "default_latch_delay_ms")]
    pub latch_delay_ms: u64,
    /// Minimum time between two accepted onsets.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

/// Spectral analysis and decision parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// FFT window length in samples. Must be a power of two.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// A candidate must score strictly above this to be reported by name.
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            onset: OnsetConfig::default(),
            analysis: AnalysisConfig::default(),
            tuning: Tuning::default(),
            ring_capacity: default_ring_capacity(),
        }
    }
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            flux_threshold: default_flux_threshold(),
            min_amplitude: default_min_amplitude(),
            latch_delay_ms: default_latch_delay_ms(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            confidence_floor: default_confidence_floor(),
        }
    }
}

fn default_flux_threshold() -> f32 { 0.015 }
fn default_min_amplitude() -> f32 { 0.08 }
fn default_latch_delay_ms() -> u64 { 200 }
fn default_cooldown_ms() -> u64 { 400 }
fn default_window_size() -> usize { 8192 }
fn default_confidence_floor() -> f32 { 0.6 }
fn default_ring_capacity() -> usize { 48_000 }

impl OnsetConfig {
    pub fn latch_delay(&self) -> Duration {
        Duration::from_millis(self.latch_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl EngineConfig {
    /// Parses a TOML document. Missing fields fall back to their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| AnalysisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Checks that the configuration can drive an analysis.
    pub fn validate(&self) -> Result<()> {
        let window = self.analysis.window_size;
        if window < 8 || !window.is_power_of_two() {
            return Err(AnalysisError::InvalidWindow(window));
        }
        if self.ring_capacity < window {
            return Err(AnalysisError::Config(format!(
                "ring_capacity ({}) is smaller than window_size ({})",
                self.ring_capacity, window
            )));
        }
        let onset = &self.onset;
        if !(onset.flux_threshold.is_finite() && onset.flux_threshold >= 0.0) {
            return Err(AnalysisError::Config("flux_threshold must be >= 0".into()));
        }
        if !(onset.min_amplitude.is_finite() && onset.min_amplitude >= 0.0) {
            return Err(AnalysisError::Config("min_amplitude must be >= 0".into()));
        }
        let floor = self.analysis.confidence_floor;
        if !(0.0..=1.0).contains(&floor) {
            return Err(AnalysisError::Config("confidence_floor must be within [0, 1]".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_tuned_values() {
        let config = EngineConfig::default();
        assert_eq!(config.onset.flux_threshold, 0.015);
        assert_eq!(config.onset.min_amplitude, 0.08);
        assert_eq!(config.onset.latch_delay(), Duration::from_millis(200));
        assert_eq!(config.onset.cooldown(), Duration::from_millis(400));
        assert_eq!(config.analysis.window_size, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            tuning = "standard"
            [onset]
            cooldown_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.onset.cooldown_ms, 250);
        assert_eq!(config.onset.latch_delay_ms, 200);
        assert_eq!(config.tuning, Tuning::Standard);
        assert_eq!(config.analysis, AnalysisConfig::default());
    }

    #[test]
    fn rejects_non_power_of_two_window() {
        let err = EngineConfig::from_toml_str("[analysis]\nwindow_size = 5000\n").unwrap_err();
        assert_eq!(err, AnalysisError::InvalidWindow(5000));
    }

    #[test]
    fn rejects_ring_smaller_than_window() {
        let err = EngineConfig::from_toml_str("ring_capacity = 1024\n").unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[onset]\nmin_amplitude = 0.12").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.onset.min_amplitude, 0.12);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = EngineConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
