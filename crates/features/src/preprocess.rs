use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::path::Path;
use thiserror::Error;

/// Longest side kept before down-scaling. Layout fingerprints don't need more.
const MAX_SIDE: u32 = 2800;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Image has no pixels")]
    Empty,
}

/// Load an image file and return a normalized grayscale page.
pub fn load_grayscale(path: &Path) -> Result<GrayImage, PreprocessError> {
    let img = image::open(path)?;
    normalize(img)
}

/// Decode raw image bytes (JPEG / PNG / WEBP / …) into a normalized grayscale page.
pub fn load_grayscale_from_bytes(data: &[u8]) -> Result<GrayImage, PreprocessError> {
    let img = image::load_from_memory(data)?;
    normalize(img)
}

/// Down-scale, grayscale, contrast stretch.
pub fn normalize(img: DynamicImage) -> Result<GrayImage, PreprocessError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(PreprocessError::Empty);
    }

    let img = if img.width() > MAX_SIDE || img.height() > MAX_SIDE {
        img.resize(MAX_SIDE, MAX_SIDE, image::imageops::FilterType::Triangle)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px == min_px {
        // Blank page: nothing to stretch.
        return Ok(gray);
    }

    let range = (max_px - min_px) as u32;
    Ok(ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([((p - min_px) as u32 * 255 / range) as u8])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_gray(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(width, height, |_, _| Luma([value])))
    }

    #[test]
    fn uniform_page_is_left_alone() {
        let gray = normalize(solid_gray(10, 10, 128)).unwrap();
        assert_eq!(gray.dimensions(), (10, 10));
        assert!(gray.pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn narrow_range_is_stretched_to_full_scale() {
        let img: GrayImage =
            ImageBuffer::from_fn(64, 1, |x, _| Luma([100 + (x as u8 % 2) * 50]));
        let gray = normalize(DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(gray.pixels().map(|p| p[0]).min(), Some(0));
        assert_eq!(gray.pixels().map(|p| p[0]).max(), Some(255));
    }

    #[test]
    fn decodes_png_bytes() {
        let mut png = Vec::new();
        solid_gray(4, 3, 90)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let gray = load_grayscale_from_bytes(&png).unwrap();
        assert_eq!(gray.dimensions(), (4, 3));
    }

    #[test]
    fn garbage_bytes_fail_to_load() {
        assert!(matches!(
            load_grayscale_from_bytes(b"definitely not an image"),
            Err(PreprocessError::Load(_))
        ));
    }

    #[test]
    fn oversized_page_is_downscaled() {
        let img: GrayImage = ImageBuffer::from_fn(3000, 100, |_, _| Luma([200u8]));
        let gray = normalize(DynamicImage::ImageLuma8(img)).unwrap();
        assert!(gray.width() <= MAX_SIDE && gray.height() <= MAX_SIDE);
    }
}
