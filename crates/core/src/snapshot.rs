use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::classifier::OnlineTemplateClassifier;
use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, ClassifierResult};
use crate::normalizer::{NormalizerState, RunningNormalizer};
use crate::store::TemplateStore;
use crate::vector::{validate_components, FeatureVector};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Inconsistent snapshot: {0}")]
    Invalid(#[from] ClassifierError),
}

/// Everything needed to resume classification exactly where it stopped:
/// raw template vectors in id order plus the normalizer's sufficient statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSnapshot {
    pub config: ClassifierConfig,
    pub dimension: Option<usize>,
    pub templates: Vec<FeatureVector>,
    pub normalizer: NormalizerState,
}

impl ClassifierSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write atomically: serialize to a sibling temp file, then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, self.to_json()?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl OnlineTemplateClassifier {
    pub fn snapshot(&self) -> ClassifierSnapshot {
        ClassifierSnapshot {
            config: self.config().clone(),
            dimension: self.dimension(),
            templates: self.templates().map(|t| t.vector.clone()).collect(),
            normalizer: self.normalizer().state(),
        }
    }

    pub fn from_snapshot(snapshot: ClassifierSnapshot) -> ClassifierResult<Self> {
        let ClassifierSnapshot { config, dimension, templates, normalizer } = snapshot;
        config.validate()?;

        if normalizer.count != templates.len() as u64 {
            return Err(ClassifierError::invalid(format!(
                "normalizer has absorbed {} vectors but there are {} templates",
                normalizer.count,
                templates.len()
            )));
        }
        let normalizer = RunningNormalizer::from_state(normalizer, config.std_floor)?;

        if !templates.is_empty() {
            let expected = normalizer.dimension();
            if dimension != Some(expected) {
                return Err(ClassifierError::invalid(format!(
                    "snapshot dimension {dimension:?} disagrees with normalizer dimension {expected}"
                )));
            }
        }
        if let (Some(fixed), Some(recorded)) = (config.dimension, dimension) {
            if fixed != recorded {
                return Err(ClassifierError::invalid(format!(
                    "configured dimension {fixed} disagrees with recorded dimension {recorded}"
                )));
            }
        }

        let mut store = TemplateStore::new();
        for vector in templates {
            if Some(vector.len()) != dimension {
                return Err(ClassifierError::DimensionMismatch {
                    expected: dimension.unwrap_or_default(),
                    actual: vector.len(),
                });
            }
            validate_components(vector.as_slice())?;
            store.append(vector);
        }

        Ok(Self::from_parts(config, dimension, normalizer, store))
    }
}
