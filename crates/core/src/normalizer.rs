use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, ClassifierResult};
use crate::vector::{validate_components, FeatureVector};

/// Default lower bound applied to a dimension's standard deviation.
pub const DEFAULT_STD_FLOOR: f64 = 1e-6;

/// Sufficient statistics of a [`RunningNormalizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerState {
    pub count: u64,
    pub mean: Vec<f64>,
    /// Per-dimension sum of squared deviations from the mean.
    pub m2: Vec<f64>,
}

/// Per-dimension mean/variance estimates over every vector folded in so far.
///
/// Seeding computes batch statistics in two passes; later vectors are folded
/// in with Welford's recurrence, so an update is O(D) and never rescans
/// history.
#[derive(Debug, Clone)]
pub struct RunningNormalizer {
    count: u64,
    mean: Vec<f64>,
    m2: Vec<f64>,
    std_floor: f64,
}

impl Default for RunningNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_STD_FLOOR)
    }
}

impl RunningNormalizer {
    pub fn new(std_floor: f64) -> Self {
        Self { count: 0, mean: Vec::new(), m2: Vec::new(), std_floor }
    }

    pub fn is_seeded(&self) -> bool {
        self.count > 0
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of dimensions, or 0 before seeding.
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn std_floor(&self) -> f64 {
        self.std_floor
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Sample variance (n − 1 denominator). A single observation has zero variance.
    pub fn variance(&self) -> Vec<f64> {
        if self.count < 2 {
            return vec![0.0; self.mean.len()];
        }
        let denom = (self.count - 1) as f64;
        self.m2.iter().map(|m| m / denom).collect()
    }

    pub fn std_dev(&self) -> Vec<f64> {
        self.variance().into_iter().map(f64::sqrt).collect()
    }

    /// Replace all statistics with those of `vectors`.
    pub fn seed(&mut self, vectors: &[FeatureVector]) -> ClassifierResult<()> {
        let first = vectors
            .first()
            .ok_or_else(|| ClassifierError::invalid("cannot seed from an empty batch"))?;
        let dim = first.len();
        for v in vectors {
            if v.len() != dim {
                return Err(ClassifierError::invalid(format!(
                    "inconsistent seed batch: expected {dim} features, got {}",
                    v.len()
                )));
            }
            validate_components(v.as_slice())?;
        }

        let n = vectors.len() as f64;
        let mut mean = vec![0.0; dim];
        for v in vectors {
            for (m, x) in mean.iter_mut().zip(v.iter()) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut m2 = vec![0.0; dim];
        for v in vectors {
            for ((acc, x), m) in m2.iter_mut().zip(v.iter()).zip(&mean) {
                let d = x - m;
                *acc += d * d;
            }
        }

        self.count = vectors.len() as u64;
        self.mean = mean;
        self.m2 = m2;
        Ok(())
    }

    /// Fold one more vector into the statistics (Welford).
    pub fn update(&mut self, vector: &FeatureVector) -> ClassifierResult<()> {
        self.check_input(vector)?;

        self.count += 1;
        let n = self.count as f64;
        for ((mean, m2), x) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(vector.iter()) {
            let delta = x - *mean;
            *mean += delta / n;
            let delta2 = x - *mean;
            *m2 += delta * delta2;
        }
        Ok(())
    }

    /// Per-dimension z-score of `vector` against the current statistics.
    pub fn standardize(&self, vector: &FeatureVector) -> ClassifierResult<FeatureVector> {
        self.check_input(vector)?;
        Ok(self.standardize_unchecked(vector.as_slice()))
    }

    /// Caller guarantees `values.len() == self.dimension()` and a seeded state.
    pub(crate) fn standardize_unchecked(&self, values: &[f64]) -> FeatureVector {
        self.standardize_with(values, &self.scale())
    }

    /// Standardize against a divisor vector precomputed by [`Self::scale`].
    pub(crate) fn standardize_with(&self, values: &[f64], scale: &[f64]) -> FeatureVector {
        values
            .iter()
            .zip(&self.mean)
            .zip(scale)
            .map(|((x, m), s)| (x - m) / s)
            .collect()
    }

    /// Per-dimension divisor: standard deviation, floored at `std_floor`.
    pub(crate) fn scale(&self) -> Vec<f64> {
        self.std_dev().into_iter().map(|s| s.max(self.std_floor)).collect()
    }

    pub fn state(&self) -> NormalizerState {
        NormalizerState { count: self.count, mean: self.mean.clone(), m2: self.m2.clone() }
    }

    pub fn from_state(state: NormalizerState, std_floor: f64) -> ClassifierResult<Self> {
        if state.mean.len() != state.m2.len() {
            return Err(ClassifierError::invalid(format!(
                "normalizer state has {} means but {} deviation sums",
                state.mean.len(),
                state.m2.len()
            )));
        }
        if state.count == 0 && !state.mean.is_empty() {
            return Err(ClassifierError::invalid("normalizer state has statistics but zero count"));
        }
        if state.count > 0 {
            validate_components(&state.mean)?;
            validate_components(&state.m2)?;
        }
        if state.m2.iter().any(|m| *m < 0.0) {
            return Err(ClassifierError::invalid("normalizer state has negative deviation sum"));
        }
        Ok(Self { count: state.count, mean: state.mean, m2: state.m2, std_floor })
    }

    fn check_input(&self, vector: &FeatureVector) -> ClassifierResult<()> {
        if !self.is_seeded() {
            return Err(ClassifierError::invalid("normalizer has not been seeded"));
        }
        if vector.len() != self.dimension() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        validate_components(vector.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(values: &[f64]) -> FeatureVector {
        FeatureVector::from(values)
    }

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-9, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn seed_computes_sample_statistics() {
        let mut n = RunningNormalizer::default();
        n.seed(&[fv(&[1.0, 10.0]), fv(&[3.0, 10.0]), fv(&[5.0, 10.0])]).unwrap();
        assert_eq!(n.count(), 3);
        assert_close(n.mean(), &[3.0, 10.0]);
        // Squared deviations 4 + 0 + 4 over n − 1 = 2.
        assert_close(&n.variance(), &[4.0, 0.0]);
    }

    #[test]
    fn seed_rejects_empty_and_ragged_batches() {
        let mut n = RunningNormalizer::default();
        assert!(matches!(n.seed(&[]), Err(ClassifierError::InvalidInput(_))));
        assert!(matches!(
            n.seed(&[fv(&[1.0, 2.0]), fv(&[1.0])]),
            Err(ClassifierError::InvalidInput(_))
        ));
        assert!(!n.is_seeded());
    }

    #[test]
    fn single_vector_has_zero_variance() {
        let mut n = RunningNormalizer::default();
        n.seed(&[fv(&[2.0, -1.0])]).unwrap();
        assert_close(&n.variance(), &[0.0, 0.0]);
    }

    #[test]
    fn welford_update_matches_batch_seed() {
        let data = [fv(&[1.0, 2.0]), fv(&[4.0, -3.0]), fv(&[0.5, 7.0]), fv(&[9.0, 1.0])];

        let mut incremental = RunningNormalizer::default();
        incremental.seed(&data[..1]).unwrap();
        for v in &data[1..] {
            incremental.update(v).unwrap();
        }

        let mut batch = RunningNormalizer::default();
        batch.seed(&data).unwrap();

        assert_eq!(incremental.count(), batch.count());
        assert_close(incremental.mean(), batch.mean());
        assert_close(&incremental.variance(), &batch.variance());
    }

    #[test]
    fn update_rejects_wrong_dimension_without_mutation() {
        let mut n = RunningNormalizer::default();
        n.seed(&[fv(&[1.0, 2.0])]).unwrap();
        let before = n.state();
        let err = n.update(&fv(&[1.0, 2.0, 3.0])).unwrap_err();
        assert_eq!(err, ClassifierError::DimensionMismatch { expected: 2, actual: 3 });
        assert_eq!(n.state(), before);
    }

    #[test]
    fn update_before_seed_is_invalid() {
        let mut n = RunningNormalizer::default();
        assert!(matches!(n.update(&fv(&[1.0])), Err(ClassifierError::InvalidInput(_))));
    }

    #[test]
    fn standardize_uses_floor_on_zero_variance() {
        let mut n = RunningNormalizer::new(0.5);
        n.seed(&[fv(&[0.0, 0.0]), fv(&[2.0, 0.0])]).unwrap();
        // mean [1, 0], std [sqrt(2), 0 → 0.5]
        let z = n.standardize(&fv(&[1.0 + 2f64.sqrt(), 1.0])).unwrap();
        assert_close(z.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn standardize_is_pure() {
        let mut n = RunningNormalizer::default();
        n.seed(&[fv(&[1.0]), fv(&[3.0])]).unwrap();
        let before = n.state();
        let a = n.standardize(&fv(&[5.0])).unwrap();
        let b = n.standardize(&fv(&[5.0])).unwrap();
        assert_eq!(a, b);
        assert_eq!(n.state(), before);
    }

    #[test]
    fn state_roundtrip_and_validation() {
        let mut n = RunningNormalizer::default();
        n.seed(&[fv(&[1.0, 2.0]), fv(&[3.0, 5.0])]).unwrap();
        let restored = RunningNormalizer::from_state(n.state(), n.std_floor()).unwrap();
        assert_eq!(restored.state(), n.state());

        let bad = NormalizerState { count: 2, mean: vec![1.0], m2: vec![-1.0] };
        assert!(RunningNormalizer::from_state(bad, DEFAULT_STD_FLOOR).is_err());
    }
}
