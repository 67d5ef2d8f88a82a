//! Configuration System
//!
//! Loads upgrade settings from upgrade.toml. Every field has a default,
//! so a partial file (or none at all) is valid.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use upgrade_events::Quality;

/// Default settings file path
pub const DEFAULT_CONFIG_PATH: &str = "upgrade.toml";

/// Allowed range for a tier multiplier.
pub const MULTIPLIER_RANGE: std::ops::RangeInclusive<f32> = 0.01..=100.0;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("multiplier {name} = {value} is outside 0.01..=100")]
    MultiplierOutOfRange { name: &'static str, value: f32 },
    #[error("tracker check interval must be at least 1 tick")]
    ZeroCheckInterval,
}

/// Cost and work multiplier for each tier transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierMultipliers {
    pub awful_to_poor: f32,
    pub poor_to_normal: f32,
    pub normal_to_good: f32,
    pub good_to_excellent: f32,
    pub excellent_to_masterwork: f32,
    pub masterwork_to_legendary: f32,
}

impl Default for TierMultipliers {
    fn default() -> Self {
        Self {
            awful_to_poor: 1.0,
            poor_to_normal: 2.0,
            normal_to_good: 3.0,
            good_to_excellent: 4.0,
            excellent_to_masterwork: 5.0,
            masterwork_to_legendary: 6.0,
        }
    }
}

impl TierMultipliers {
    /// Multiplier for upgrading out of `from`. `None` for the terminal tier.
    pub fn for_transition(&self, from: Quality) -> Option<f32> {
        match from {
            Quality::Awful => Some(self.awful_to_poor),
            Quality::Poor => Some(self.poor_to_normal),
            Quality::Normal => Some(self.normal_to_good),
            Quality::Good => Some(self.good_to_excellent),
            Quality::Excellent => Some(self.excellent_to_masterwork),
            Quality::Masterwork => Some(self.masterwork_to_legendary),
            Quality::Legendary => None,
        }
    }

    fn named(&self) -> [(&'static str, f32); 6] {
        [
            ("awful_to_poor", self.awful_to_poor),
            ("poor_to_normal", self.poor_to_normal),
            ("normal_to_good", self.normal_to_good),
            ("good_to_excellent", self.good_to_excellent),
            ("excellent_to_masterwork", self.excellent_to_masterwork),
            ("masterwork_to_legendary", self.masterwork_to_legendary),
        ]
    }
}

/// Which targets may be chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Highest tier offered as an upgrade target.
    pub max_quality: Quality,
    /// Offer "upgrade and keep" targets.
    pub keep_option_enabled: bool,
    /// Items are not upgraded past the quality of the bench they are worked at.
    pub limit_item_quality_to_workbench: bool,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_quality: Quality::Legendary,
            keep_option_enabled: false,
            limit_item_quality_to_workbench: true,
        }
    }
}

/// Background re-evaluation of active intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Ticks between re-trigger checks of one intent.
    pub check_interval: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self { check_interval: 600 }
    }
}

/// Resource: all upgrade settings
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeSettings {
    pub multipliers: TierMultipliers,
    pub limits: LimitSettings,
    pub tracker: TrackerSettings,
}

impl UpgradeSettings {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Loads from `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parses and validates configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Returns the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.multipliers.named() {
            if !MULTIPLIER_RANGE.contains(&value) {
                return Err(ConfigError::MultiplierOutOfRange { name, value });
            }
        }
        if self.tracker.check_interval == 0 {
            return Err(ConfigError::ZeroCheckInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = UpgradeSettings::default();
        assert_eq!(settings.multipliers.for_transition(Quality::Awful), Some(1.0));
        assert_eq!(settings.multipliers.for_transition(Quality::Masterwork), Some(6.0));
        assert_eq!(settings.multipliers.for_transition(Quality::Legendary), None);
        assert_eq!(settings.limits.max_quality, Quality::Legendary);
        assert!(!settings.limits.keep_option_enabled);
        assert!(settings.limits.limit_item_quality_to_workbench);
        assert_eq!(settings.tracker.check_interval, 600);
    }

    #[test]
    fn test_partial_toml() {
        let settings = UpgradeSettings::from_str(
            r#"
            [multipliers]
            poor_to_normal = 1.5

            [limits]
            max_quality = "masterwork"
            keep_option_enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.multipliers.poor_to_normal, 1.5);
        assert_eq!(settings.multipliers.normal_to_good, 3.0);
        assert_eq!(settings.limits.max_quality, Quality::Masterwork);
        assert!(settings.limits.keep_option_enabled);
        assert!(settings.limits.limit_item_quality_to_workbench);
    }

    #[test]
    fn test_out_of_range_multiplier_rejected() {
        let result = UpgradeSettings::from_str("[multipliers]\nnormal_to_good = 250.0\n");
        assert!(matches!(
            result,
            Err(ConfigError::MultiplierOutOfRange { name: "normal_to_good", .. })
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = UpgradeSettings::from_str("[tracker]\ncheck_interval = 0\n");
        assert!(matches!(result, Err(ConfigError::ZeroCheckInterval)));
    }

    #[test]
    fn test_round_trip_through_file() {
        let mut settings = UpgradeSettings::default();
        settings.limits.max_quality = Quality::Excellent;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(settings.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = UpgradeSettings::from_file(file.path()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = UpgradeSettings::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, UpgradeSettings::default());
    }
}
