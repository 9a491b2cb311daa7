use std::error::Error;
use std::fmt::{Display, Formatter};

use image::imageops::FilterType;
use ndarray::Array4;

/// A snapshot of the drawing canvas as raw RGBA pixels.
///
/// Produced by the canvas widget and consumed read-only by the pipeline;
/// it lives only for the duration of one recognition request.
#[derive(Debug, Clone)]
pub struct RawBitmap {
    pub width: u32,
    pub height: u32,
    /// Pixel data, 4 bytes (RGBA) per pixel in row-major order.
    pub rgba: Vec<u8>,
}

impl RawBitmap {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }
}

/// Errors that can occur while converting a bitmap into a model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreprocessError {
    /// The bitmap has a zero width or height
    ZeroDimensions,
    /// The pixel buffer length does not match width * height * 4
    BufferMismatch { expected: usize, actual: usize },
}

impl Display for PreprocessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessError::ZeroDimensions => {
                write!(f, "bitmap has a zero width or height")
            }
            PreprocessError::BufferMismatch { expected, actual } => write!(
                f,
                "pixel buffer length {} does not match expected {} (width * height * 4)",
                actual, expected
            ),
        }
    }
}

impl Error for PreprocessError {}

/// Converts a canvas bitmap into the normalized tensor the model expects.
///
/// The transform is fixed: grayscale, invert, Lanczos resize to
/// `target_size` x `target_size`, scale to `[0.0, 1.0]`, reshape to
/// `(1, target_size, target_size, 1)`. The intensity inversion matches the
/// model's training convention of light ink on a dark background, while
/// the canvas draws dark ink on a light background.
///
/// This function is total: a malformed bitmap yields an all-zero tensor of
/// the correct shape instead of an error, so the caller always has a valid
/// input to hand to the classifier.
pub fn preprocess(bitmap: &RawBitmap, target_size: u32) -> Array4<f32> {
    match try_preprocess(bitmap, target_size) {
        Ok(tensor) => tensor,
        Err(e) => {
            tracing::warn!("image preprocessing failed: {e}; substituting a blank input");
            let s = target_size as usize;
            Array4::zeros((1, s, s, 1))
        }
    }
}

fn try_preprocess(bitmap: &RawBitmap, target_size: u32) -> Result<Array4<f32>, PreprocessError> {
    if bitmap.width == 0 || bitmap.height == 0 || target_size == 0 {
        return Err(PreprocessError::ZeroDimensions);
    }
    let expected = bitmap.width as usize * bitmap.height as usize * 4;
    if bitmap.rgba.len() != expected {
        return Err(PreprocessError::BufferMismatch {
            expected,
            actual: bitmap.rgba.len(),
        });
    }

    let rgba = image::RgbaImage::from_raw(bitmap.width, bitmap.height, bitmap.rgba.clone())
        .ok_or(PreprocessError::BufferMismatch {
            expected,
            actual: bitmap.rgba.len(),
        })?;

    let mut gray = image::DynamicImage::ImageRgba8(rgba).to_luma8();
    image::imageops::invert(&mut gray);

    // The resample filter matters: antialiasing quality feeds straight into
    // classification accuracy, so nearest-neighbor is not an option here.
    let resized = image::imageops::resize(&gray, target_size, target_size, FilterType::Lanczos3);

    let s = target_size as usize;
    let mut tensor = Array4::zeros((1, s, s, 1));
    for (x, y, pixel) in resized.enumerate_pixels() {
        tensor[[0, y as usize, x as usize, 0]] = pixel.0[0] as f32 / 255.0;
    }
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_bitmap(width: u32, height: u32, rgba: [u8; 4]) -> RawBitmap {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        RawBitmap::new(width, height, pixels)
    }

    #[test]
    fn output_shape_and_range_hold_for_any_valid_bitmap() {
        let bitmap = solid_bitmap(280, 280, [120, 30, 200, 255]);
        let tensor = preprocess(&bitmap, 28);
        assert_eq!(tensor.shape(), &[1, 28, 28, 1]);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn white_canvas_becomes_zero_tensor() {
        // White pixels invert to zero intensity, so a blank canvas is a
        // blank model input.
        let bitmap = solid_bitmap(280, 280, [255, 255, 255, 255]);
        let tensor = preprocess(&bitmap, 28);
        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn black_canvas_becomes_full_intensity() {
        let bitmap = solid_bitmap(56, 56, [0, 0, 0, 255]);
        let tensor = preprocess(&bitmap, 28);
        assert!(tensor.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn zero_dimension_bitmap_falls_back_to_zero_tensor() {
        let bitmap = RawBitmap::new(0, 0, Vec::new());
        let tensor = preprocess(&bitmap, 28);
        assert_eq!(tensor.shape(), &[1, 28, 28, 1]);
        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn truncated_pixel_buffer_falls_back_to_zero_tensor() {
        let bitmap = RawBitmap::new(280, 280, vec![255; 100]);
        let tensor = preprocess(&bitmap, 28);
        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn preprocess_is_deterministic() {
        let bitmap = solid_bitmap(280, 280, [10, 200, 90, 255]);
        assert_eq!(preprocess(&bitmap, 28), preprocess(&bitmap, 28));
    }

    #[test]
    fn try_preprocess_reports_buffer_mismatch() {
        let bitmap = RawBitmap::new(4, 4, vec![0; 7]);
        assert_eq!(
            try_preprocess(&bitmap, 28),
            Err(PreprocessError::BufferMismatch {
                expected: 64,
                actual: 7
            })
        );
    }
}
