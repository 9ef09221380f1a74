use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stencil_core::ClassifierConfig;
use stencil_features::ExtractorConfig;

pub const CONFIG_FILE: &str = "stencil.toml";
const SNAPSHOT_FILE: &str = "templates.json";
const INTAKE_DIR: &str = "intake";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where classifier state is persisted between runs.
    pub snapshot_path: Option<PathBuf>,
    /// Folder watched by `stencil watch`.
    pub intake_dir: Option<PathBuf>,
    pub classifier: ClassifierConfig,
    pub extractor: ExtractorConfig,
}

impl AppConfig {
    /// Load from an explicit path (must exist), or from the per-user config
    /// directory (missing file means defaults).
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.classifier.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse TOML config")
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn snapshot_path(&self) -> anyhow::Result<PathBuf> {
        match &self.snapshot_path {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir()?.join(SNAPSHOT_FILE)),
        }
    }

    pub fn intake_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.intake_dir {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir()?.join(INTAKE_DIR)),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "stencil", "Stencil")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join(CONFIG_FILE))
}

fn data_dir() -> anyhow::Result<PathBuf> {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .context("Failed to determine application data directory")
}
