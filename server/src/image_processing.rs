//! Upload decoding and overlay encoding
//!
//! - Decode any supported container into RGB8
//! - Downsample to the analysis edge limit, keeping the original for rendering
//! - Encode RGBA overlays as PNG

use crate::error::AppError;
use image::{imageops::FilterType, RgbImage, RgbaImage};
use png::{BitDepth, ColorType, Encoder};
use std::io::Cursor;

/// A decoded upload plus the buffer analysis runs on
pub struct PreparedImage {
    pub original: RgbImage,
    pub working: RgbImage,
    /// Working size over original size, 1.0 when no downsampling happened
    pub scale: f64,
}

/// Decode `image_data` and shrink a working copy so its long edge is at most `max_edge`
pub fn prepare(image_data: &[u8], max_edge: u32) -> Result<PreparedImage, AppError> {
    if image_data.is_empty() {
        return Err(AppError::ImageDecode("request body is empty".to_string()));
    }

    let original = image::load_from_memory(image_data)
        .map_err(|e| AppError::ImageDecode(e.to_string()))?
        .to_rgb8();

    let (width, height) = original.dimensions();
    if width == 0 || height == 0 {
        return Err(AppError::ImageDecode(format!(
            "image has no pixels ({}x{})",
            width, height
        )));
    }

    let (working, scale) = downsample(&original, max_edge);
    tracing::debug!(
        "Prepared {}x{} upload, working buffer {}x{} (scale {:.3})",
        width,
        height,
        working.width(),
        working.height(),
        scale
    );

    Ok(PreparedImage {
        original,
        working,
        scale,
    })
}

/// Resize so the long edge fits `max_edge`, returning the image and the applied scale
fn downsample(img: &RgbImage, max_edge: u32) -> (RgbImage, f64) {
    let (src_width, src_height) = img.dimensions();
    let long_edge = src_width.max(src_height);
    if long_edge <= max_edge {
        return (img.clone(), 1.0);
    }

    let scale = max_edge as f64 / long_edge as f64;
    let new_width = ((src_width as f64 * scale).round() as u32).max(1);
    let new_height = ((src_height as f64 * scale).round() as u32).max(1);

    // Triangle (bilinear) is plenty for statistics
    let resized = image::imageops::resize(img, new_width, new_height, FilterType::Triangle);
    (resized, scale)
}

/// Encode an RGBA buffer as an 8-bit PNG
pub fn encode_rgba_png(img: &RgbaImage) -> Result<Vec<u8>, AppError> {
    let (width, height) = img.dimensions();
    let mut output = Vec::new();

    {
        let mut encoder = Encoder::new(Cursor::new(&mut output), width, height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| AppError::ImageProcessing(format!("PNG header error: {}", e)))?;

        writer
            .write_image_data(img.as_raw())
            .map_err(|e| AppError::ImageProcessing(format!("PNG write error: {}", e)))?;
    }

    Ok(output)
}
