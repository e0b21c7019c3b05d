//! TOML configuration file support for the selection engine (spec.md §3).

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::model::{RecencyDecay, TimeAdaptationMethod};

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Figment(figment::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Figment(e) => write!(f, "config error: {e}"),
            Self::Serialize(e) => write!(f, "TOML serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Figment(e)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Serialize(e)
    }
}

/// Root tunables for the weight calculator and time adapter (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub enabled: bool,
    pub image_cooldown_days: f64,
    pub source_cooldown_days: f64,
    pub favorite_boost: f64,
    pub new_image_boost: f64,
    pub color_match_weight: f64,
    pub recency_decay: RecencyDecay,
    pub time_adaptation: TimeAdaptationConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            image_cooldown_days: 7.0,
            source_cooldown_days: 1.0,
            favorite_boost: 2.0,
            new_image_boost: 1.5,
            color_match_weight: 1.0,
            recency_decay: RecencyDecay::default(),
            time_adaptation: TimeAdaptationConfig::default(),
        }
    }
}

/// Day/night palette-target adaptation settings (spec.md §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAdaptationConfig {
    pub method: TimeAdaptationMethod,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub day_start: Option<String>,
    pub night_start: Option<String>,
    pub day_preset: String,
    pub night_preset: String,
    pub tolerance: Option<f64>,
}

impl Default for TimeAdaptationConfig {
    fn default() -> Self {
        Self {
            method: TimeAdaptationMethod::default(),
            latitude: None,
            longitude: None,
            day_start: Some("07:00".to_string()),
            night_start: Some("19:00".to_string()),
            day_preset: "neutral_day".to_string(),
            night_preset: "dark_mode".to_string(),
            tolerance: None,
        }
    }
}

impl SelectionConfig {
    /// Layered load: compiled-in defaults, then `path` if it exists, then
    /// `SMARTSEL_`-prefixed environment variables, highest priority last.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("SMARTSEL_").split("_"));
        Ok(figment.extract()?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = SelectionConfig::default();
        assert!(config.enabled);
        assert_eq!(config.image_cooldown_days, 7.0);
        assert_eq!(config.favorite_boost, 2.0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SelectionConfig::load(Path::new("/does/not/exist.toml")).unwrap();
        assert_eq!(config, SelectionConfig::default());
    }

    #[test]
    fn load_then_save_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.toml");
        let mut config = SelectionConfig::default();
        config.favorite_boost = 3.5;
        config.save(&path).unwrap();

        let loaded = SelectionConfig::load(&path).unwrap();
        assert_eq!(loaded.favorite_boost, 3.5);
    }
}
