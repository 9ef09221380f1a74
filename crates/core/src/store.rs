use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ClassifierError, ClassifierResult};
use crate::vector::FeatureVector;

/// Dense, creation-ordered cluster id. The k-th template created has id k.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub usize);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TemplateId> for usize {
    fn from(id: TemplateId) -> usize {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: TemplateId,
    /// The raw vector that created this template. Standardized forms are
    /// derived on demand against the current normalizer.
    pub vector: FeatureVector,
}

/// Append-only collection of templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: Vec<Template>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, vector: FeatureVector) -> TemplateId {
        let id = TemplateId(self.templates.len());
        self.templates.push(Template { id, vector });
        id
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, id: TemplateId) -> ClassifierResult<&FeatureVector> {
        self.templates
            .get(id.0)
            .map(|t| &t.vector)
            .ok_or(ClassifierError::NotFound(id))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Template> {
        self.templates.iter()
    }

    pub fn vectors(&self) -> impl Iterator<Item = &FeatureVector> {
        self.templates.iter().map(|t| &t.vector)
    }
}

impl<'a> IntoIterator for &'a TemplateStore {
    type Item = &'a Template;
    type IntoIter = std::slice::Iter<'a, Template>;

    fn into_iter(self) -> Self::IntoIter {
        self.templates.iter()
    }
}
