use crate::application::bias::BiasConfig;
use crate::application::confidence::ConfidenceConfig;
use crate::application::forecast::ForecastConfig;
use crate::application::fusion::FusionConfig;
use crate::application::learning::LearningConfig;
use crate::domain::{AnalyticsError, AnalyticsResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Every tunable of the analytics core, as read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Overrides the default database location
    pub database_path: Option<String>,
    pub fusion: FusionConfig,
    pub confidence: ConfidenceConfig,
    pub bias: BiasConfig,
    pub learning: LearningConfig,
    pub forecast: ForecastConfig,
}

impl AnalyticsConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        self.confidence.validate()?;

        let sum = self.fusion.source_weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(AnalyticsError::validation(format!(
                "fusion source weights must sum to 1.0, got {sum:.4}"
            )));
        }
        if self.bias.medium_threshold > self.bias.high_threshold {
            return Err(AnalyticsError::validation(
                "bias medium threshold exceeds the high threshold",
            ));
        }
        if self.learning.validation_chunk_size == 0 {
            return Err(AnalyticsError::validation(
                "feedback validation chunk size must be positive",
            ));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| app_data_dir().join("insights.sqlite"))
    }
}

/// Loads the configuration, falling back to defaults when the file is
/// missing or cannot be parsed.
pub fn load_config() -> AnalyticsConfig {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> AnalyticsConfig {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return AnalyticsConfig::default();
    };
    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("Ignoring invalid config at {}: {}", path.display(), err);
            AnalyticsConfig::default()
        }
    }
}

pub fn save_config(config: &AnalyticsConfig) -> anyhow::Result<()> {
    save_config_to(config, &config_path())
}

pub fn save_config_to(config: &AnalyticsConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create config dir {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("serialize config")?;
    std::fs::write(path, contents).with_context(|| format!("write config {}", path.display()))
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("THERAPY_INSIGHTS_CONFIG") {
        return PathBuf::from(path);
    }

    app_data_dir().join("config.toml")
}

pub fn app_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var("THERAPY_INSIGHTS_DATA_HOME") {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home::home_dir() {
            return home
                .join("Library")
                .join("Application Support")
                .join("TherapyInsights");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("TherapyInsights");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("therapy-insights");
        }
        if let Some(home) = home::home_dir() {
            return home.join(".local").join("share").join("therapy-insights");
        }
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".therapy-insights")
}
