use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, ScopeError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file and validates it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.analysis.validate()
    }
}

/// How a delivery shorter than the live buffer treats the samples it did not
/// overwrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// Samples are written from index 0; the rest of the buffer keeps whatever
    /// an earlier delivery left there.
    Retain,
    /// Samples are written from index 0 and the rest of the buffer is zeroed.
    ZeroFill,
    /// Existing contents shift towards index 0 and the new samples are appended
    /// at the end, so the buffer always holds the most recent samples.
    #[default]
    Rolling,
}

/// Configuration specific to the audio subsystem. These are requests: the
/// backend may grant something else, which is then adopted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Length of the live and snapshot buffers, and of the transform.
    pub buffer_size: usize,
    pub channels: u16,
    #[serde(default)]
    pub tail_policy: TailPolicy,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            buffer_size: 4096,
            channels: 1,
            tail_policy: TailPolicy::default(),
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ScopeError::InvalidConfig(
                "sample rate must be positive".into(),
            ));
        }
        if self.buffer_size < 2 {
            return Err(ScopeError::InvalidConfig(format!(
                "buffer size must be at least 2, got {}",
                self.buffer_size
            )));
        }
        if self.channels == 0 {
            return Err(ScopeError::InvalidConfig(
                "channel count must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration of the spectrum analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Multiplier applied to every magnitude bin.
    pub scale: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { scale: 5.0 }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        validate_scale(self.scale)
    }
}

pub(crate) fn validate_scale(scale: f32) -> Result<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(ScopeError::InvalidConfig(format!(
            "spectrum scale must be a positive number, got {scale}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.audio.buffer_size, 4096);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.analysis.scale, 5.0);
    }

    #[test]
    fn rejects_degenerate_values() {
        let mut config = AppConfig::default();
        config.audio.buffer_size = 1;
        assert!(matches!(
            config.validate(),
            Err(ScopeError::InvalidConfig(_))
        ));

        let mut config = AppConfig::default();
        config.audio.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.analysis.scale = -1.0;
        assert!(config.validate().is_err());

        assert!(validate_scale(f32::NAN).is_err());
    }

    #[test]
    fn parses_partial_json() {
        let config: AppConfig =
            serde_json::from_str(r#"{"audio":{"sample_rate":48000,"buffer_size":1024,"channels":1}}"#)
                .unwrap();
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.audio.tail_policy, TailPolicy::Rolling);
        assert_eq!(config.analysis, AnalysisConfig::default());
    }

    #[test]
    fn round_trips_through_a_file() {
        let path = std::env::temp_dir().join(format!(
            "spectroscope-config-{}.json",
            std::process::id()
        ));
        let mut config = AppConfig::default();
        config.audio.tail_policy = TailPolicy::Retain;
        config.write_to(&path).unwrap();

        let loaded = AppConfig::from_path(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}
