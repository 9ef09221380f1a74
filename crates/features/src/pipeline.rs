use image::GrayImage;
use std::path::{Path, PathBuf};
use stencil_core::{ClassifierError, OnlineTemplateClassifier};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::extract::{ExtractError, FeatureExtractor};
use crate::hash::DocumentDigest;
use crate::preprocess::{self, PreprocessError};
use crate::types::ClassifiedDocument;

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "webp", "pnm", "pbm", "pgm",
];

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Feature extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("Classification failed: {0}")]
    Classify(#[from] ClassifierError),
}

/// Orchestrates: hash → decode → normalize → extract → classify.
///
/// The pipeline owns its classifier outright, so a single task driving it
/// serializes every classification.
pub struct DocumentPipeline<E: FeatureExtractor> {
    extractor: E,
    classifier: OnlineTemplateClassifier,
}

impl<E: FeatureExtractor> DocumentPipeline<E> {
    /// Fails if the classifier already expects a different feature length
    /// than the extractor produces.
    pub fn new(extractor: E, classifier: OnlineTemplateClassifier) -> Result<Self, PipelineError> {
        if let Some(expected) = classifier.dimension() {
            let actual = extractor.dimension();
            if expected != actual {
                return Err(ClassifierError::DimensionMismatch { expected, actual }.into());
            }
        }
        Ok(Self { extractor, classifier })
    }

    /// Process a file on disk.
    pub async fn process_file(&mut self, path: &Path) -> Result<ClassifiedDocument, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        self.process_bytes(&bytes, Some(path.to_path_buf()))
    }

    /// Process raw encoded image bytes.
    pub fn process_bytes(
        &mut self,
        data: &[u8],
        source: Option<PathBuf>,
    ) -> Result<ClassifiedDocument, PipelineError> {
        let digest = DocumentDigest::of(data);
        let page = preprocess::load_grayscale_from_bytes(data)?;
        self.process_image(&page, digest, source)
    }

    /// Classify an already-decoded page.
    pub fn process_image(
        &mut self,
        page: &GrayImage,
        digest: DocumentDigest,
        source: Option<PathBuf>,
    ) -> Result<ClassifiedDocument, PipelineError> {
        let features = self.extractor.extract(page)?;
        let outcome = self.classifier.classify_detailed(&features)?;
        tracing::debug!(
            digest = %digest.short(),
            template = %outcome.id,
            created = outcome.created,
            "document classified"
        );
        Ok(ClassifiedDocument::new(digest, source, outcome))
    }

    pub fn classifier(&self) -> &OnlineTemplateClassifier {
        &self.classifier
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn into_classifier(self) -> OnlineTemplateClassifier {
        self.classifier
    }
}

/// Whether `path` has an image extension the decoder understands.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// Spawn a notify watcher on `watch_dir` that sends newly created image paths
/// to `tx`. The returned watcher must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) if matches!(ev.kind, EventKind::Create(_)) => {
                for path in ev.paths.into_iter().filter(|p| is_supported_image(p)) {
                    if tx.try_send(path).is_err() {
                        tracing::warn!("Intake queue full or closed; dropping event");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Intake watcher error: {e}"),
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
