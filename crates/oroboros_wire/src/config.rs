//! # Channel Configuration
//!
//! Knobs that change how a channel treats strings, plus the settings of the
//! offline field priority report. Both load from TOML once at startup:
//!
//! ```toml
//! samples = 20000
//! seed = 7
//! buffer_size = 16384
//!
//! [channel]
//! strip = true
//! max_string_chars = 1024
//! max_big_string_chars = 8192
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{WireError, WireResult};

/// Default limit for ordinary strings (command text, names).
pub const MAX_STRING_CHARS: usize = 1024;

/// Default limit for configuration blobs.
pub const BIG_INFO_STRING: usize = 8192;

/// Per-channel string policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Replace bytes with the high bit set by `.` in strings.
    pub strip: bool,
    /// Longest string (including terminator) accepted by `write_string`.
    pub max_string_chars: usize,
    /// Longest string (including terminator) accepted by `write_big_string`.
    pub max_big_string_chars: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            strip: false,
            max_string_chars: MAX_STRING_CHARS,
            max_big_string_chars: BIG_INFO_STRING,
        }
    }
}

impl ChannelConfig {
    /// Parses a channel config from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Config`] on malformed TOML or a zero string limit.
    pub fn from_toml_str(source: &str) -> WireResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| WireError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> WireResult<()> {
        if self.max_string_chars == 0 || self.max_big_string_chars == 0 {
            return Err(WireError::Config("string limits must be non-zero".into()));
        }
        Ok(())
    }
}

/// Settings for the `field_priority` report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Number of synthetic deltas per record kind.
    pub samples: usize,
    /// RNG seed, so two runs produce the same report.
    pub seed: u64,
    /// Backing buffer size for each encoded message.
    pub buffer_size: usize,
    /// Channel settings used while encoding.
    pub channel: ChannelConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            samples: 10_000,
            seed: 0x0B0B_0505,
            buffer_size: crate::MAX_MSGLEN,
            channel: ChannelConfig::default(),
        }
    }
}

impl ReportConfig {
    /// Parses a report config from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Config`] on malformed TOML or empty workloads.
    pub fn from_toml_str(source: &str) -> WireResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| WireError::Config(e.to_string()))?;
        if config.samples == 0 || config.buffer_size == 0 {
            return Err(WireError::Config("samples and buffer_size must be non-zero".into()));
        }
        config.channel.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_defaults() {
        let config = ChannelConfig::default();
        assert!(!config.strip);
        assert_eq!(config.max_string_chars, 1024);
        assert_eq!(config.max_big_string_chars, 8192);
    }

    #[test]
    fn test_channel_from_toml() {
        let config = ChannelConfig::from_toml_str("strip = true\nmax_string_chars = 64\n").unwrap();
        assert!(config.strip);
        assert_eq!(config.max_string_chars, 64);
        assert_eq!(config.max_big_string_chars, BIG_INFO_STRING);
    }

    #[test]
    fn test_channel_rejects_zero_limit() {
        let err = ChannelConfig::from_toml_str("max_string_chars = 0").unwrap_err();
        assert!(matches!(err, WireError::Config(_)));
    }

    #[test]
    fn test_report_from_toml() {
        let config = ReportConfig::from_toml_str(
            "samples = 50\nseed = 9\n[channel]\nstrip = true\n",
        )
        .unwrap();
        assert_eq!(config.samples, 50);
        assert_eq!(config.seed, 9);
        assert_eq!(config.buffer_size, 16_384);
        assert!(config.channel.strip);
    }

    #[test]
    fn test_report_rejects_garbage() {
        assert!(ReportConfig::from_toml_str("samples = \"many\"").is_err());
        assert!(ReportConfig::from_toml_str("samples = 0").is_err());
    }
}
