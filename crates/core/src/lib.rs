pub mod classifier;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod shared;
pub mod snapshot;
pub mod store;
pub mod vector;

pub use classifier::{Classification, OnlineTemplateClassifier};
pub use config::ClassifierConfig;
pub use error::{ClassifierError, ClassifierResult};
pub use normalizer::{NormalizerState, RunningNormalizer};
pub use shared::SharedClassifier;
pub use snapshot::{ClassifierSnapshot, SnapshotError};
pub use store::{Template, TemplateId, TemplateStore};
pub use vector::{euclidean_distance, FeatureVector};
