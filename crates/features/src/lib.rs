pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod types;

pub use extract::{
    CombinedExtractor, ExtractError, ExtractorConfig, FeatureExtractor, FixedExtractor,
    GridDensityExtractor, ProjectionProfileExtractor,
};
pub use hash::DocumentDigest;
pub use pipeline::{is_supported_image, spawn_intake_watcher, DocumentPipeline, PipelineError};
pub use preprocess::{load_grayscale, load_grayscale_from_bytes, PreprocessError};
pub use types::ClassifiedDocument;
