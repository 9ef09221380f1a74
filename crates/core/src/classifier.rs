use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, ClassifierResult};
use crate::normalizer::RunningNormalizer;
use crate::store::{Template, TemplateId, TemplateStore};
use crate::vector::{euclidean_distance, validate_components, FeatureVector};

/// Relative tolerance under which two distances are treated as tied.
const TIE_TOLERANCE: f64 = 1e-9;

/// Outcome of a single [`OnlineTemplateClassifier::classify_detailed`] call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub id: TemplateId,
    /// Standardized distance to the nearest pre-existing template. `None`
    /// when the store was empty and this vector became template 0.
    pub distance: Option<f64>,
    /// Whether this call appended a new template.
    pub created: bool,
}

/// Nearest-template classifier over a growing, append-only template set.
///
/// Every call standardizes the input and every stored template against the
/// same current statistics, so results depend on call order: the normalizer
/// drifts whenever a template is created, and reclassifying a vector later
/// may yield a different id.
#[derive(Debug, Clone)]
pub struct OnlineTemplateClassifier {
    config: ClassifierConfig,
    dimension: Option<usize>,
    normalizer: RunningNormalizer,
    store: TemplateStore,
}

impl OnlineTemplateClassifier {
    pub fn new(config: ClassifierConfig) -> ClassifierResult<Self> {
        config.validate()?;
        Ok(Self {
            dimension: config.dimension,
            normalizer: RunningNormalizer::new(config.std_floor),
            store: TemplateStore::new(),
            config,
        })
    }

    /// Seed both the template set and the normalizer from a non-empty batch.
    /// Template ids follow batch order.
    pub fn with_initial_templates(
        config: ClassifierConfig,
        initial_templates: Vec<FeatureVector>,
    ) -> ClassifierResult<Self> {
        let mut classifier = Self::new(config)?;
        let first = initial_templates
            .first()
            .ok_or_else(|| ClassifierError::invalid("initial_templates must not be empty"))?;
        if let Some(expected) = classifier.dimension {
            if first.len() != expected {
                return Err(ClassifierError::DimensionMismatch { expected, actual: first.len() });
            }
        }

        classifier.normalizer.seed(&initial_templates)?;
        classifier.dimension = Some(first.len());
        for vector in initial_templates {
            classifier.store.append(vector);
        }

        tracing::debug!(
            templates = classifier.store.len(),
            dimension = classifier.normalizer.dimension(),
            "classifier seeded"
        );
        Ok(classifier)
    }

    /// Rebuild from parts already checked by the caller (snapshot restore).
    pub(crate) fn from_parts(
        config: ClassifierConfig,
        dimension: Option<usize>,
        normalizer: RunningNormalizer,
        store: TemplateStore,
    ) -> Self {
        Self { config, dimension, normalizer, store }
    }

    pub fn classify(&mut self, vector: &FeatureVector) -> ClassifierResult<TemplateId> {
        self.classify_detailed(vector).map(|c| c.id)
    }

    /// Assign `vector` to its nearest template, or create a new template when
    /// the nearest one is farther than the threshold. Errors leave state untouched.
    pub fn classify_detailed(&mut self, vector: &FeatureVector) -> ClassifierResult<Classification> {
        self.check_input(vector)?;

        if self.store.is_empty() {
            self.normalizer.seed(std::slice::from_ref(vector))?;
            self.dimension = Some(vector.len());
            let id = self.store.append(vector.clone());
            tracing::info!(template = %id, "first template created");
            return Ok(Classification { id, distance: None, created: true });
        }

        let (best_id, min_distance) = self.nearest_unchecked(vector);

        if min_distance <= self.config.threshold {
            tracing::debug!(
                template = %best_id,
                distance = min_distance,
                threshold = self.config.threshold,
                "matched existing template"
            );
            return Ok(Classification { id: best_id, distance: Some(min_distance), created: false });
        }

        self.normalizer.update(vector)?;
        let id = self.store.append(vector.clone());
        tracing::info!(
            template = %id,
            nearest = %best_id,
            distance = min_distance,
            threshold = self.config.threshold,
            "new template created"
        );
        Ok(Classification { id, distance: Some(min_distance), created: true })
    }

    /// Nearest template and its standardized distance, without mutating
    /// anything. `None` while no template exists.
    pub fn nearest(&self, vector: &FeatureVector) -> ClassifierResult<Option<(TemplateId, f64)>> {
        self.check_input(vector)?;
        if self.store.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.nearest_unchecked(vector)))
    }

    /// Standardized distance from `vector` to every template, in id order.
    pub fn distances(&self, vector: &FeatureVector) -> ClassifierResult<Vec<(TemplateId, f64)>> {
        self.check_input(vector)?;
        Ok(self.distances_unchecked(vector))
    }

    pub fn template_count(&self) -> usize {
        self.store.len()
    }

    pub fn template_vector(&self, id: TemplateId) -> ClassifierResult<&FeatureVector> {
        self.store.get(id)
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.store.iter()
    }

    pub fn normalizer(&self) -> &RunningNormalizer {
        &self.normalizer
    }

    /// Established feature length, if any vector has been seen or configured.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn check_input(&self, vector: &FeatureVector) -> ClassifierResult<()> {
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(ClassifierError::DimensionMismatch { expected, actual: vector.len() });
            }
        }
        validate_components(vector.as_slice())
    }

    fn distances_unchecked(&self, vector: &FeatureVector) -> Vec<(TemplateId, f64)> {
        let scale = self.normalizer.scale();
        let z = self.normalizer.standardize_with(vector.as_slice(), &scale);
        self.store
            .iter()
            .map(|t| {
                let zt = self.normalizer.standardize_with(t.vector.as_slice(), &scale);
                (t.id, euclidean_distance(z.as_slice(), zt.as_slice()))
            })
            .collect()
    }

    /// Lowest id within tolerance of the true minimum, paired with that
    /// minimum. Requires a non-empty store and an input of the established
    /// dimension.
    fn nearest_unchecked(&self, vector: &FeatureVector) -> (TemplateId, f64) {
        let distances = self.distances_unchecked(vector);
        let min = distances.iter().map(|(_, d)| *d).fold(f64::INFINITY, f64::min);
        let cutoff = min + TIE_TOLERANCE * min.max(1.0);
        let id = distances
            .iter()
            .find(|(_, d)| *d <= cutoff)
            .map_or(TemplateId(0), |(id, _)| *id);
        (id, min)
    }
}
