use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ClassifierError, ClassifierResult};

/// A fixed-length numeric fingerprint of one document image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }
}

impl From<&[f64]> for FeatureVector {
    fn from(values: &[f64]) -> Self {
        FeatureVector(values.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for FeatureVector {
    fn from(values: [f64; N]) -> Self {
        FeatureVector(values.to_vec())
    }
}

impl FromIterator<f64> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        FeatureVector(iter.into_iter().collect())
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v:.4}")?;
        }
        write!(f, "]")
    }
}

/// Euclidean distance between two equal-length slices.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Rejects empty vectors and non-finite components.
pub(crate) fn validate_components(values: &[f64]) -> ClassifierResult<()> {
    if values.is_empty() {
        return Err(ClassifierError::invalid("feature vector is empty"));
    }
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(ClassifierError::invalid(format!(
            "feature {pos} is not finite ({})",
            values[pos]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_of_identical_vectors_is_zero() {
        assert_eq!(euclidean_distance(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn distance_three_four_five() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_nan_and_empty() {
        assert!(validate_components(&[]).is_err());
        assert!(validate_components(&[1.0, f64::NAN]).is_err());
        assert!(validate_components(&[f64::INFINITY]).is_err());
        assert!(validate_components(&[0.0, -2.5]).is_ok());
    }

    #[test]
    fn display_rounds_components() {
        let v = FeatureVector::from([0.5, 1.0 / 3.0]);
        assert_eq!(v.to_string(), "[0.5000, 0.3333]");
    }
}
