use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use stencil_core::{ClassifierSnapshot, OnlineTemplateClassifier};
use stencil_features::{
    is_supported_image, spawn_intake_watcher, ClassifiedDocument, DocumentPipeline,
    FeatureExtractor,
};
use tokio::sync::mpsc;

use crate::config::AppConfig;

/// Resume from the snapshot if one exists, otherwise start empty.
pub fn load_classifier(config: &AppConfig) -> anyhow::Result<OnlineTemplateClassifier> {
    let path = config.snapshot_path()?;
    if !path.exists() {
        tracing::info!("No snapshot at {}; starting with no templates", path.display());
        return Ok(OnlineTemplateClassifier::new(config.classifier.clone())?);
    }

    let snapshot = ClassifierSnapshot::load(&path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    if snapshot.config != config.classifier {
        tracing::warn!(
            "Snapshot {} was created with different classifier settings; keeping the snapshot's",
            path.display()
        );
    }
    let classifier = OnlineTemplateClassifier::from_snapshot(snapshot)?;
    tracing::info!(
        "Loaded {} templates from {}",
        classifier.template_count(),
        path.display()
    );
    Ok(classifier)
}

pub fn save_classifier(config: &AppConfig, classifier: &OnlineTemplateClassifier) -> anyhow::Result<()> {
    let path = config.snapshot_path()?;
    classifier
        .snapshot()
        .save(&path)
        .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
    tracing::info!("Saved {} templates to {}", classifier.template_count(), path.display());
    Ok(())
}

fn build_pipeline(
    config: &AppConfig,
) -> anyhow::Result<DocumentPipeline<Box<dyn FeatureExtractor>>> {
    let extractor = config.extractor.build()?;
    let classifier = load_classifier(config)?;
    Ok(DocumentPipeline::new(extractor, classifier)?)
}

/// Expand directories into their supported images, sorted so runs are
/// reproducible. Explicit file arguments are kept as given.
pub fn collect_images(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to list {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported_image(p))
                .collect();
            found.sort();
            out.extend(found);
        } else {
            out.push(input.clone());
        }
    }
    Ok(out)
}

fn emit(doc: &ClassifiedDocument) -> anyhow::Result<()> {
    let line = serde_json::to_string(doc)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    Ok(())
}

// ── classify ──────────────────────────────────────────────────────────────────

pub async fn classify(config: &AppConfig, inputs: &[PathBuf]) -> anyhow::Result<()> {
    let paths = collect_images(inputs)?;
    if paths.is_empty() {
        anyhow::bail!("No images found in the given paths");
    }

    let mut pipeline = build_pipeline(config)?;
    let starting = pipeline.classifier().template_count();
    let mut failed = 0usize;

    for path in &paths {
        match pipeline.process_file(path).await {
            Ok(doc) => emit(&doc)?,
            Err(e) => {
                failed += 1;
                tracing::warn!("Skipping {}: {e}", path.display());
            }
        }
    }

    let classifier = pipeline.into_classifier();
    tracing::info!(
        documents = paths.len(),
        failed,
        new_templates = classifier.template_count() - starting,
        templates = classifier.template_count(),
        "Batch complete"
    );
    save_classifier(config, &classifier)
}

// ── watch ─────────────────────────────────────────────────────────────────────

pub async fn watch(config: &AppConfig, dir_override: Option<&Path>) -> anyhow::Result<()> {
    let intake_dir = match dir_override {
        Some(d) => d.to_path_buf(),
        None => config.intake_dir()?,
    };
    std::fs::create_dir_all(&intake_dir)
        .with_context(|| format!("Failed to create intake directory {}", intake_dir.display()))?;

    let mut pipeline = build_pipeline(config)?;

    // The channel bridges the notify watcher thread and this task, which is
    // the classifier's only owner.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = spawn_intake_watcher(&intake_dir, tx)
        .with_context(|| format!("Failed to watch {}", intake_dir.display()))?;
    tracing::info!("Watching intake folder: {}", intake_dir.display());

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(path) = received else { break };
                tracing::info!("Processing document: {}", path.display());
                match pipeline.process_file(&path).await {
                    Ok(doc) => {
                        emit(&doc)?;
                        if doc.new_template {
                            save_classifier(config, pipeline.classifier())?;
                        }
                    }
                    Err(e) => tracing::warn!("Document pipeline error for {}: {e}", path.display()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    save_classifier(config, pipeline.classifier())
}

// ── templates ─────────────────────────────────────────────────────────────────

pub fn templates(config: &AppConfig) -> anyhow::Result<()> {
    let classifier = load_classifier(config)?;
    let mut stdout = std::io::stdout().lock();
    for template in classifier.templates() {
        let line = serde_json::json!({
            "id": template.id,
            "vector": template.vector,
        });
        writeln!(stdout, "{line}")?;
    }
    tracing::info!(
        templates = classifier.template_count(),
        dimension = ?classifier.dimension(),
        "Template listing complete"
    );
    Ok(())
}
