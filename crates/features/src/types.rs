use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stencil_core::{Classification, TemplateId};

use crate::hash::DocumentDigest;

/// One document's classification, as emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedDocument {
    pub digest: DocumentDigest,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<PathBuf>,
    pub template_id: TemplateId,
    /// Standardized distance to the nearest template that existed before this
    /// document arrived. Absent for the very first template.
    pub distance: Option<f64>,
    pub new_template: bool,
    pub processed_at: DateTime<Utc>,
}

impl ClassifiedDocument {
    pub fn new(digest: DocumentDigest, source: Option<PathBuf>, outcome: Classification) -> Self {
        Self {
            digest,
            source,
            template_id: outcome.id,
            distance: outcome.distance,
            new_template: outcome.created,
            processed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_classification_outcome() {
        let doc = ClassifiedDocument::new(
            DocumentDigest::of(b"scan"),
            None,
            Classification { id: TemplateId(3), distance: Some(0.25), created: false },
        );
        assert_eq!(doc.template_id, TemplateId(3));
        assert_eq!(doc.distance, Some(0.25));
        assert!(!doc.new_template);
    }

    #[test]
    fn json_line_shape() {
        let doc = ClassifiedDocument::new(
            DocumentDigest::of(b"scan"),
            Some(PathBuf::from("inbox/a.png")),
            Classification { id: TemplateId(0), distance: None, created: true },
        );
        let value: serde_json::Value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["template_id"], 0);
        assert_eq!(value["new_template"], true);
        assert_eq!(value["source"], "inbox/a.png");
        assert!(value["distance"].is_null());
        assert_eq!(value["digest"].as_str().unwrap().len(), 64);

        let back: ClassifiedDocument = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }
}
