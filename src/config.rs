use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::rounding::RoundingMode;
use crate::{Error, Result};

// serde default functions
const fn default_confidence_level() -> f64 {
    0.95
}
const fn default_significant_digits() -> u32 {
    2
}
const fn default_samples() -> usize {
    100_000
}
const fn default_seed() -> u64 {
    40
}

/// Calculation settings, read from TOML
///
/// Every field has a default, so an empty document is valid:
///
/// ```toml
/// confidence_level = 0.95
///
/// [rounding]
/// significant_digits = 2
/// mode = "five_percent"
///
/// [monte_carlo]
/// samples = 100000
/// seed = 40
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Coverage probability of the expanded uncertainty
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default)]
    pub rounding: RoundingSettings,
    #[serde(default)]
    pub monte_carlo: MonteCarloSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoundingSettings {
    #[serde(default = "default_significant_digits")]
    pub significant_digits: u32,
    #[serde(default)]
    pub mode: RoundingMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MonteCarloSettings {
    /// Number of draws
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence_level: default_confidence_level(),
            rounding: RoundingSettings::default(),
            monte_carlo: MonteCarloSettings::default(),
        }
    }
}

impl Default for RoundingSettings {
    fn default() -> Self {
        Self {
            significant_digits: default_significant_digits(),
            mode: RoundingMode::default(),
        }
    }
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            seed: default_seed(),
        }
    }
}

impl Settings {
    /// Parse and validate settings
    ///
    /// # Errors
    /// Returns [`Error::Toml`] for malformed documents or unknown keys and [`Error::Config`] for
    /// out of range values.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not hold valid settings.
    pub fn from_file(path: &Path) -> Result<Self> {
        log::info!("reading settings from {path:?}");
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// # Errors
    /// Returns [`Error::Config`] naming the first out of range value.
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::Config(format!(
                "confidence_level must lie strictly between 0 and 1, found {}",
                self.confidence_level
            )));
        }
        if self.rounding.significant_digits == 0 {
            return Err(Error::Config(
                "rounding.significant_digits must be at least 1".to_owned(),
            ));
        }
        if self.monte_carlo.samples < 2 {
            return Err(Error::Config(format!(
                "monte_carlo.samples must be at least 2, found {}",
                self.monte_carlo.samples
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::Settings;
    use crate::rounding::RoundingMode;
    use crate::Error;

    #[test]
    fn empty_document_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        approx::assert_relative_eq!(settings.confidence_level, 0.95);
        assert_eq!(settings.rounding.significant_digits, 2);
        assert_eq!(settings.rounding.mode, RoundingMode::FivePercent);
        assert_eq!(settings.monte_carlo.samples, 100_000);
        assert_eq!(settings.monte_carlo.seed, 40);
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let settings = Settings::from_toml(
            r#"
            confidence_level = 0.99

            [rounding]
            mode = "half_up"
            "#,
        )
        .unwrap();
        approx::assert_relative_eq!(settings.confidence_level, 0.99);
        assert_eq!(settings.rounding.mode, RoundingMode::HalfUp);
        assert_eq!(settings.rounding.significant_digits, 2);
        assert_eq!(settings.monte_carlo.seed, 40);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            Settings::from_toml("confidence_level = 1.5"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml("[rounding]\nsignificant_digits = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml("[monte_carlo]\nsamples = 1"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml("confidence = 0.9"),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn settings_are_read_from_disk() {
        let tmp_dir = TempDir::new("settings").unwrap();
        let path = tmp_dir.path().join("settings.toml");
        std::fs::write(&path, toml::to_string(&Settings::default()).unwrap()).unwrap();

        assert_eq!(Settings::from_file(&path).unwrap(), Settings::default());
    }
}
