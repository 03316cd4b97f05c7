use anyhow::{Context, Result};
use fitchat_contracts::session::EncodedBitmap;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

pub const DEFAULT_MAX_DIMENSION: u32 = 800;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizePolicy {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for NormalizePolicy {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("unsupported or corrupt image data")
}

pub fn normalize_bytes(bytes: &[u8], policy: NormalizePolicy) -> Result<EncodedBitmap> {
    let image = decode(bytes)?;
    normalize(&image, policy)
}

/// Flattens transparency onto white, bounds the longer side to
/// `policy.max_dimension` and encodes the result as base64 JPEG.
pub fn normalize(image: &DynamicImage, policy: NormalizePolicy) -> Result<EncodedBitmap> {
    let opaque = flatten_onto_white(image);
    let bounded = bound_dimensions(opaque, policy.max_dimension);
    let (width, height) = bounded.dimensions();

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, policy.jpeg_quality.clamp(1, 100));
    encoder
        .encode_image(&bounded)
        .with_context(|| format!("failed to encode {width}x{height} image as JPEG"))?;
    Ok(EncodedBitmap::from_jpeg_bytes(&bytes, width, height))
}

/// RGB copy of `image`. Pixels with alpha are composited onto an opaque white
/// background; images without alpha are converted as-is.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}

/// Target size for an image whose longer side must not exceed `max_dimension`.
/// Aspect ratio is kept; the shorter side is rounded and never drops below 1.
pub fn bounded_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    let scale = f64::from(max_dimension) / f64::from(width.max(height));
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_dimension);
    (scaled(width), scaled(height))
}

fn bound_dimensions(image: RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (target_width, target_height) = bounded_size(width, height, max_dimension);
    if (target_width, target_height) == (width, height) {
        return image;
    }
    imageops::resize(&image, target_width, target_height, FilterType::Lanczos3)
}
