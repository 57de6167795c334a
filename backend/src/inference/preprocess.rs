use std::io::Cursor;

use image::imageops::FilterType;
use image::ImageReader;
use ndarray::Array4;

/// Side length the model artifact was trained on. Changing it means changing
/// the model.
pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Empty image upload")]
    Empty,
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Decode(#[from] image::ImageError),
}

/// Decodes `image` and turns it into an NHWC batch of one: RGB, resized to
/// `INPUT_SIZE` square without cropping, scaled to `[0, 1]`.
pub fn preprocess(image: &[u8]) -> Result<Array4<f32>, PreprocessError> {
    if image.is_empty() {
        return Err(PreprocessError::Empty);
    }

    let decoded = ImageReader::new(Cursor::new(image))
        .with_guessed_format()?
        .decode()?;
    let rgb = decoded.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let side = INPUT_SIZE as usize;
    let tensor = Array4::from_shape_fn((1, side, side, CHANNELS), |(_, y, x, c)| {
        f32::from(resized.get_pixel(x as u32, y as u32)[c]) / 255.0
    });
    Ok(tensor)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    pub(crate) fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    pub(crate) fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    #[test]
    fn any_dimensions_yield_fixed_shape() {
        for (w, h) in [(1, 1), (224, 224), (640, 480), (37, 901)] {
            let tensor = preprocess(&png(w, h, [10, 20, 30])).unwrap();
            assert_eq!(tensor.shape(), &[1, 224, 224, 3], "{w}x{h}");
            assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    // Resampling may round a uniform image by one intensity step.
    const STEP: f32 = 1.5 / 255.0;

    #[test]
    fn solid_color_is_scaled_by_255() {
        let tensor = preprocess(&png(300, 120, [255, 0, 51])).unwrap();
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < STEP);
        assert!(tensor[[0, 100, 100, 1]].abs() < STEP);
        assert!((tensor[[0, 223, 223, 2]] - 0.2).abs() < STEP);
    }

    #[test]
    fn grayscale_is_expanded_to_rgb() {
        let gray = GrayImage::from_pixel(50, 80, Luma([128]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);
        let tensor = preprocess(&bytes).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        let expected = 128.0 / 255.0;
        for c in 0..3 {
            assert!((tensor[[0, 10, 10, c]] - expected).abs() < STEP);
        }
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let rgba = RgbaImage::from_pixel(64, 64, Rgba([0, 255, 0, 10]));
        let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);
        let tensor = preprocess(&bytes).unwrap();
        assert_eq!(tensor.shape()[3], 3);
        assert!((tensor[[0, 5, 5, 1]] - 1.0).abs() < STEP);
    }

    #[test]
    fn jpeg_uploads_decode() {
        let img = RgbImage::from_pixel(320, 240, Rgb([90, 90, 90]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);
        let tensor = preprocess(&bytes).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = preprocess(b"this is not an image").unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(preprocess(&[]), Err(PreprocessError::Empty)));
    }
}
