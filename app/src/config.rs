// Application configuration
//
// Layering: built-in defaults < config file (`callout-wizard.toml`) < `CALLOUT_WIZARD_*` env vars.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::utils::path_resolver;
use crate::wizard::RetreatPolicy;

const ENV_PREFIX: &str = "CALLOUT_WIZARD_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetreatSetting {
    #[default]
    Preserve,
    ClearForward,
}

impl RetreatSetting {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "preserve" => Some(RetreatSetting::Preserve),
            "clear_forward" => Some(RetreatSetting::ClearForward),
            _ => None,
        }
    }
}

impl From<RetreatSetting> for RetreatPolicy {
    fn from(value: RetreatSetting) -> Self {
        match value {
            RetreatSetting::Preserve => RetreatPolicy::Preserve,
            RetreatSetting::ClearForward => RetreatPolicy::ClearForward,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder holding `maps.json` / `hero.json`.
    pub catalog_dir: PathBuf,
    /// Folder for saved callouts.
    pub data_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub retreat_policy: RetreatSetting,
    /// Map card width in terminal cells.
    pub card_width: u16,
    pub card_spacing: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_dir: PathBuf::from("."),
            data_dir: path_resolver::default_data_folder(),
            log_dir: None,
            retreat_policy: RetreatSetting::Preserve,
            card_width: 22,
            card_spacing: 2,
        }
    }
}

impl AppConfig {
    /// Load from the first config file found, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match path_resolver::config_file_candidates()
            .into_iter()
            .find(|p| p.is_file())
        {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        info!("[PHASE: config] [STEP: load] Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `CALLOUT_WIZARD_*` overrides using `lookup` to read variables.
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        if let Some(v) = var("CATALOG_DIR") {
            self.catalog_dir = PathBuf::from(v);
        }
        if let Some(v) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("RETREAT_POLICY") {
            match RetreatSetting::parse(&v) {
                Some(p) => self.retreat_policy = p,
                None => warn!(
                    "[PHASE: config] [STEP: env] Ignoring unknown retreat policy '{}'",
                    v
                ),
            }
        }
        if let Some(v) = var("CARD_WIDTH") {
            match v.trim().parse::<u16>() {
                Ok(n) if n > 0 => self.card_width = n,
                _ => warn!("[PHASE: config] [STEP: env] Ignoring invalid card width '{}'", v),
            }
        }
        if let Some(v) = var("CARD_SPACING") {
            match v.trim().parse::<u16>() {
                Ok(n) => self.card_spacing = n,
                Err(_) => warn!(
                    "[PHASE: config] [STEP: env] Ignoring invalid card spacing '{}'",
                    v
                ),
            }
        }
    }

    pub fn retreat_policy(&self) -> RetreatPolicy {
        self.retreat_policy.into()
    }
}
