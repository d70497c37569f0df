//! TOML configuration.
//!
//! ```toml
//! # libmzxml.toml
//! ms1_window = 12
//! compress_peaks = false
//! parent_file_type = "RAWData"
//! ```

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::ms1_window::Ms1Window;
use crate::peaks::PeakCompression;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of MS1 scans retained for averaging
    pub ms1_window: usize,

    /// zlib-compress `<peaks>` payloads when writing
    pub compress_peaks: bool,

    /// `fileType` written into `<parentFile>`
    pub parent_file_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ms1_window: Ms1Window::DEFAULT_CAPACITY,
            compress_peaks: false,
            parent_file_type: "RAWData".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        ensure!(config.ms1_window > 0, "ms1_window must be at least 1");
        Ok(config)
    }

    pub fn peak_compression(&self) -> PeakCompression {
        if self.compress_peaks {
            PeakCompression::Zlib
        } else {
            PeakCompression::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            ms1_window = 8
            compress_peaks = true
            parent_file_type = "ThermoRAW"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.ms1_window, 8);
        assert!(config.compress_peaks);
        assert_eq!(config.parent_file_type, "ThermoRAW");
        assert_eq!(config.peak_compression(), PeakCompression::Zlib);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ms1_window, 12);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(Config::from_str("ms1_window = 0").is_err());
    }
}
