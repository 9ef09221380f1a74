use std::sync::{Arc, Mutex, MutexGuard};

use crate::classifier::{Classification, OnlineTemplateClassifier};
use crate::error::ClassifierResult;
use crate::snapshot::ClassifierSnapshot;
use crate::store::TemplateId;
use crate::vector::FeatureVector;

/// Cloneable handle that serializes every call on one classifier.
///
/// The distance scan and the conditional append run under a single lock, so
/// two threads can never both miss and create near-duplicate templates.
#[derive(Debug, Clone)]
pub struct SharedClassifier {
    inner: Arc<Mutex<OnlineTemplateClassifier>>,
}

impl SharedClassifier {
    pub fn new(classifier: OnlineTemplateClassifier) -> Self {
        Self { inner: Arc::new(Mutex::new(classifier)) }
    }

    pub fn classify(&self, vector: &FeatureVector) -> ClassifierResult<TemplateId> {
        self.lock().classify(vector)
    }

    pub fn classify_detailed(&self, vector: &FeatureVector) -> ClassifierResult<Classification> {
        self.lock().classify_detailed(vector)
    }

    pub fn template_count(&self) -> usize {
        self.lock().template_count()
    }

    pub fn snapshot(&self) -> ClassifierSnapshot {
        self.lock().snapshot()
    }

    /// Run `f` with exclusive access to the classifier.
    pub fn with<T>(&self, f: impl FnOnce(&mut OnlineTemplateClassifier) -> T) -> T {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Returns the classifier if this is the last handle.
    pub fn into_inner(self) -> Result<OnlineTemplateClassifier, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(|e| e.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }

    // Classifier failures never leave partial state, so a poisoned lock still
    // guards a consistent value.
    fn lock(&self) -> MutexGuard<'_, OnlineTemplateClassifier> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl From<OnlineTemplateClassifier> for SharedClassifier {
    fn from(classifier: OnlineTemplateClassifier) -> Self {
        Self::new(classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use std::thread;

    #[test]
    fn concurrent_identical_novel_vectors_create_one_template() {
        let c = OnlineTemplateClassifier::with_initial_templates(
            ClassifierConfig::with_threshold(0.5),
            vec![FeatureVector::from([0.0, 0.0]), FeatureVector::from([1.0, 1.0])],
        )
        .unwrap();
        let shared = SharedClassifier::new(c);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || shared.classify(&FeatureVector::from([50.0, 50.0])).unwrap())
            })
            .collect();
        let ids: Vec<TemplateId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(ids.iter().all(|id| *id == TemplateId(2)), "{ids:?}");
        assert_eq!(shared.template_count(), 3);
    }

    #[test]
    fn with_sees_changes_from_every_handle() {
        let shared = SharedClassifier::new(
            OnlineTemplateClassifier::new(ClassifierConfig::with_threshold(0.5)).unwrap(),
        );
        let other = shared.clone();
        other.classify(&FeatureVector::from([1.0, 2.0])).unwrap();

        let created = shared.with(|c| {
            let out = c.classify_detailed(&FeatureVector::from([9.0, -4.0])).unwrap();
            (out.created, c.template_count(), c.dimension())
        });
        assert_eq!(created, (true, 2, Some(2)));
        assert_eq!(other.template_count(), 2);
        assert_eq!(other.snapshot(), shared.snapshot());
    }

    #[test]
    fn into_inner_requires_last_handle() {
        let shared = SharedClassifier::new(
            OnlineTemplateClassifier::new(ClassifierConfig::default()).unwrap(),
        );
        let other = shared.clone();
        let shared = shared.into_inner().unwrap_err();
        drop(other);
        assert!(shared.into_inner().is_ok());
    }
}
