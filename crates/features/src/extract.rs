use image::GrayImage;
use serde::{Deserialize, Serialize};
use stencil_core::FeatureVector;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("Image has no pixels")]
    EmptyImage,
    #[error("Invalid extractor layout: {0}")]
    InvalidLayout(String),
}

/// Deterministic mapping from a page image to a fixed-length fingerprint.
pub trait FeatureExtractor: Send + Sync {
    /// Length of every vector this extractor produces.
    fn dimension(&self) -> usize;

    fn extract(&self, image: &GrayImage) -> Result<FeatureVector, ExtractError>;
}

impl<E: FeatureExtractor + ?Sized> FeatureExtractor for Box<E> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn extract(&self, image: &GrayImage) -> Result<FeatureVector, ExtractError> {
        (**self).extract(image)
    }
}

// ── Grid density ──────────────────────────────────────────────────────────────

/// Mean ink coverage (0.0 = white, 1.0 = black) of each cell in a
/// `rows × cols` grid laid over the page, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDensityExtractor {
    rows: u32,
    cols: u32,
}

impl GridDensityExtractor {
    pub fn new(rows: u32, cols: u32) -> Result<Self, ExtractError> {
        if rows == 0 || cols == 0 {
            return Err(ExtractError::InvalidLayout(format!("grid {rows}x{cols} has no cells")));
        }
        if rows.checked_mul(cols).is_none() {
            return Err(ExtractError::InvalidLayout(format!("grid {rows}x{cols} has too many cells")));
        }
        Ok(Self { rows, cols })
    }
}

impl FeatureExtractor for GridDensityExtractor {
    fn dimension(&self) -> usize {
        (self.rows * self.cols) as usize
    }

    fn extract(&self, image: &GrayImage) -> Result<FeatureVector, ExtractError> {
        check_not_empty(image)?;
        let (w, h) = image.dimensions();
        let mut out = Vec::with_capacity(self.dimension());
        for r in 0..self.rows {
            let (y0, y1) = span(r, self.rows, h);
            for c in 0..self.cols {
                let (x0, x1) = span(c, self.cols, w);
                let mut sum = 0.0;
                for y in y0..y1 {
                    for x in x0..x1 {
                        sum += ink(image.get_pixel(x, y)[0]);
                    }
                }
                out.push(sum / ((y1 - y0) * (x1 - x0)) as f64);
            }
        }
        Ok(FeatureVector::new(out))
    }
}

// ── Projection profiles ──────────────────────────────────────────────────────

/// Horizontal then vertical ink projection profiles, each resampled to
/// `bins` values. Captures where text lines and columns sit on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionProfileExtractor {
    bins: u32,
}

impl ProjectionProfileExtractor {
    pub fn new(bins: u32) -> Result<Self, ExtractError> {
        if bins == 0 {
            return Err(ExtractError::InvalidLayout("projection needs at least one bin".into()));
        }
        Ok(Self { bins })
    }
}

impl FeatureExtractor for ProjectionProfileExtractor {
    fn dimension(&self) -> usize {
        2 * self.bins as usize
    }

    fn extract(&self, image: &GrayImage) -> Result<FeatureVector, ExtractError> {
        check_not_empty(image)?;
        let (w, h) = image.dimensions();

        let mut row_ink = vec![0.0; h as usize];
        let mut col_ink = vec![0.0; w as usize];
        for (x, y, p) in image.enumerate_pixels() {
            let v = ink(p[0]);
            row_ink[y as usize] += v / w as f64;
            col_ink[x as usize] += v / h as f64;
        }

        let mut out = resample(&row_ink, self.bins);
        out.extend(resample(&col_ink, self.bins));
        Ok(FeatureVector::new(out))
    }
}

// ── Combined ──────────────────────────────────────────────────────────────────

/// Grid densities followed by projection profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedExtractor {
    grid: GridDensityExtractor,
    projection: ProjectionProfileExtractor,
}

impl CombinedExtractor {
    pub fn new(grid: GridDensityExtractor, projection: ProjectionProfileExtractor) -> Self {
        Self { grid, projection }
    }
}

impl FeatureExtractor for CombinedExtractor {
    fn dimension(&self) -> usize {
        self.grid.dimension() + self.projection.dimension()
    }

    fn extract(&self, image: &GrayImage) -> Result<FeatureVector, ExtractError> {
        let mut out = self.grid.extract(image)?.into_inner();
        out.extend(self.projection.extract(image)?.into_inner());
        Ok(FeatureVector::new(out))
    }
}

// ── Fixed (test double) ───────────────────────────────────────────────────────

/// Returns a preset vector regardless of the image, for exercising the
/// pipeline without depending on pixel content.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedExtractor {
    pub vector: FeatureVector,
}

impl FixedExtractor {
    pub fn new(vector: impl Into<FeatureVector>) -> Self {
        Self { vector: vector.into() }
    }
}

impl FeatureExtractor for FixedExtractor {
    fn dimension(&self) -> usize {
        self.vector.len()
    }

    fn extract(&self, _image: &GrayImage) -> Result<FeatureVector, ExtractError> {
        Ok(self.vector.clone())
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorConfig {
    Grid { rows: u32, cols: u32 },
    Projection { bins: u32 },
    Combined { rows: u32, cols: u32, bins: u32 },
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig::Grid { rows: 8, cols: 8 }
    }
}

impl ExtractorConfig {
    pub fn build(&self) -> Result<Box<dyn FeatureExtractor>, ExtractError> {
        let extractor: Box<dyn FeatureExtractor> = match *self {
            ExtractorConfig::Grid { rows, cols } => Box::new(GridDensityExtractor::new(rows, cols)?),
            ExtractorConfig::Projection { bins } => Box::new(ProjectionProfileExtractor::new(bins)?),
            ExtractorConfig::Combined { rows, cols, bins } => Box::new(CombinedExtractor::new(
                GridDensityExtractor::new(rows, cols)?,
                ProjectionProfileExtractor::new(bins)?,
            )),
        };
        Ok(extractor)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn check_not_empty(image: &GrayImage) -> Result<(), ExtractError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ExtractError::EmptyImage);
    }
    Ok(())
}

fn ink(luma: u8) -> f64 {
    1.0 - luma as f64 / 255.0
}

/// Half-open pixel range covered by cell `i` of `n` along an axis of `len`
/// pixels. Never empty, even when there are more cells than pixels.
fn span(i: u32, n: u32, len: u32) -> (u32, u32) {
    let start = (i as u64 * len as u64 / n as u64) as u32;
    let end = ((i as u64 + 1) * len as u64 / n as u64) as u32;
    let start = start.min(len - 1);
    (start, end.max(start + 1))
}

/// Average `values` into `bins` buckets using the same spans as the grid.
fn resample(values: &[f64], bins: u32) -> Vec<f64> {
    let len = values.len() as u32;
    (0..bins)
        .map(|b| {
            let (s, e) = span(b, bins, len);
            let slice = &values[s as usize..e as usize];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    /// White page with the top half black.
    fn top_half_black(w: u32, h: u32) -> GrayImage {
        ImageBuffer::from_fn(w, h, |_, y| Luma([if y < h / 2 { 0 } else { 255 }]))
    }

    #[test]
    fn grid_reports_cell_coverage() {
        let ex = GridDensityExtractor::new(2, 2).unwrap();
        let v = ex.extract(&top_half_black(10, 10)).unwrap();
        assert_eq!(v.as_slice(), &[1.0, 1.0, 0.0, 0.0]);
        assert_eq!(ex.dimension(), 4);
    }

    #[test]
    fn grid_handles_more_cells_than_pixels() {
        let ex = GridDensityExtractor::new(4, 4).unwrap();
        let img: GrayImage = ImageBuffer::from_fn(2, 2, |_, _| Luma([0]));
        let v = ex.extract(&img).unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|x| *x == 1.0));
    }

    #[test]
    fn projection_profiles_locate_ink() {
        let ex = ProjectionProfileExtractor::new(2).unwrap();
        let v = ex.extract(&top_half_black(8, 8)).unwrap();
        // Rows: top band full, bottom empty. Columns: every column half inked.
        assert_eq!(v.len(), 4);
        let expect = [1.0, 0.0, 0.5, 0.5];
        for (a, b) in v.iter().zip(expect) {
            assert!((a - b).abs() < 1e-12, "{v}");
        }
    }

    #[test]
    fn combined_concatenates() {
        let ex = CombinedExtractor::new(
            GridDensityExtractor::new(1, 2).unwrap(),
            ProjectionProfileExtractor::new(1).unwrap(),
        );
        let v = ex.extract(&top_half_black(4, 4)).unwrap();
        assert_eq!(v.len(), ex.dimension());
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn extraction_is_deterministic() {
        let ex = ExtractorConfig::Combined { rows: 3, cols: 5, bins: 7 }.build().unwrap();
        let img: GrayImage = ImageBuffer::from_fn(37, 23, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
        assert_eq!(ex.extract(&img).unwrap(), ex.extract(&img).unwrap());
        assert_eq!(ex.extract(&img).unwrap().len(), ex.dimension());
    }

    #[test]
    fn zero_layouts_are_rejected() {
        assert!(GridDensityExtractor::new(0, 3).is_err());
        assert!(ProjectionProfileExtractor::new(0).is_err());
        assert!(ExtractorConfig::Projection { bins: 0 }.build().is_err());
    }

    #[test]
    fn oversized_grid_is_rejected() {
        assert!(matches!(
            GridDensityExtractor::new(u32::MAX, 2),
            Err(ExtractError::InvalidLayout(_))
        ));
        assert!(ExtractorConfig::Grid { rows: 65_536, cols: 65_536 }.build().is_err());
        assert_eq!(GridDensityExtractor::new(65_535, 65_535).unwrap().dimension(), 65_535 * 65_535);
    }

    #[test]
    fn empty_image_is_rejected() {
        let ex = GridDensityExtractor::new(2, 2).unwrap();
        assert_eq!(ex.extract(&GrayImage::new(0, 0)), Err(ExtractError::EmptyImage));
    }

    #[test]
    fn config_parses_from_toml() {
        let cfg: ExtractorConfig = toml::from_str("kind = \"projection\"\nbins = 12\n").unwrap();
        assert_eq!(cfg, ExtractorConfig::Projection { bins: 12 });
        assert_eq!(cfg.build().unwrap().dimension(), 24);
    }

    #[test]
    fn fixed_extractor_ignores_pixels() {
        let ex = FixedExtractor::new(vec![1.0, 2.0]);
        assert_eq!(ex.extract(&top_half_black(3, 3)).unwrap().as_slice(), &[1.0, 2.0]);
    }
}
