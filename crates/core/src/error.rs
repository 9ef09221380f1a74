use thiserror::Error;

use crate::store::TemplateId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Template not found: {0}")]
    NotFound(TemplateId),
}

impl ClassifierError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ClassifierError::InvalidInput(msg.into())
    }
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;
