use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, ClassifierResult};
use crate::normalizer::DEFAULT_STD_FLOOR;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Largest standardized distance that still counts as a match.
    pub threshold: f64,
    /// Floor for per-dimension standard deviation during standardization.
    pub std_floor: f64,
    /// Fixed feature length. When unset, the first vector observed decides it.
    pub dimension: Option<usize>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            std_floor: DEFAULT_STD_FLOOR,
            dimension: None,
        }
    }
}

impl ClassifierConfig {
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold, ..Self::default() }
    }

    pub fn validate(&self) -> ClassifierResult<()> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ClassifierError::invalid(format!(
                "threshold must be a positive finite number, got {}",
                self.threshold
            )));
        }
        if !self.std_floor.is_finite() || self.std_floor <= 0.0 {
            return Err(ClassifierError::invalid(format!(
                "std_floor must be a positive finite number, got {}",
                self.std_floor
            )));
        }
        if self.dimension == Some(0) {
            return Err(ClassifierError::invalid("dimension must be at least 1"));
        }
        Ok(())
    }

    pub fn from_toml(toml_content: &str) -> ClassifierResult<Self> {
        let config: ClassifierConfig = toml::from_str(toml_content)
            .map_err(|e| ClassifierError::invalid(format!("Failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
