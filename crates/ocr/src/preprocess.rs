use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma};
use imageproc::contrast::ThresholdType;
use std::io::Cursor;
use thiserror::Error;

use shelfscan_core::ScanError;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

impl From<PreprocessError> for ScanError {
    fn from(e: PreprocessError) -> Self {
        ScanError::Recognition(e.to_string())
    }
}

/// A decoded source image and the container format it came in.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: Option<ImageFormat>,
}

/// Decode raw file bytes, guessing the format from content.
pub fn decode(data: &[u8]) -> Result<DecodedImage, PreprocessError> {
    let format = image::guess_format(data).ok();
    let image = image::load_from_memory(data)?;
    Ok(DecodedImage { image, format })
}

/// Downscale, grayscale and contrast-stretch; PNG out. The primary
/// recognition input.
pub fn prepare_for_ocr(img: &DynamicImage, max_dimension: u32) -> Result<Vec<u8>, PreprocessError> {
    encode_as_png(normalize(img.clone(), max_dimension))
}

/// As `prepare_for_ocr`, then Otsu-thresholded to pure black and white.
/// Printed labels often read better this way.
pub fn prepare_binarized(img: &DynamicImage, max_dimension: u32) -> Result<Vec<u8>, PreprocessError> {
    let gray = normalize(img.clone(), max_dimension).to_luma8();
    encode_as_png(DynamicImage::ImageLuma8(binarize(&gray)))
}

/// Grayscale + contrast stretch.
fn normalize(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    // Tesseract works best around 300 DPI; very large photos only cost time.
    let img = if img.width() > max_dimension || img.height() > max_dimension {
        img.resize(max_dimension, max_dimension, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px <= min_px {
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        let v = ((p - min_px) as u32 * 255 / range) as u8;
        Luma([v])
    });

    DynamicImage::ImageLuma8(stretched)
}

/// Global threshold at the Otsu level: above goes white, the rest black.
fn binarize(gray: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(gray);
    imageproc::contrast::threshold(gray, level, ThresholdType::Binary)
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
