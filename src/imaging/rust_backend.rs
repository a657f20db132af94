//! Pure Rust image backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (TIFF, PNG) | `image::ImageReader` |
//! | Encode TIFF + ImageJ tags | `tiff::encoder::TiffEncoder` |
//! | Encode PNG + `pHYs`/`tEXt` | `png::Encoder` |
//!
//! The `image` crate's own encoders cannot attach custom tags or text
//! chunks, so encoding goes straight to the format crates.

use super::backend::{BackendError, ImageBackend};
use crate::scaling::{MetadataBlock, escape_non_ascii, to_rational};
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::encoder::{Rational, TiffEncoder, TiffValue, colortype};
use tiff::tags::{ResolutionUnit, Tag};

/// Pure Rust backend using the `image`, `tiff` and `png` crates.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn encode_failed(path: &Path, e: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("Failed to encode {}: {}", path.display(), e))
}

/// TIFF ASCII tags reject non-ASCII and NUL bytes; tEXt chunks take
/// Latin-1 only. Escaped 7-bit text fits both.
fn metadata_text(text: &str) -> String {
    escape_non_ascii(text).replace('\0', "")
}

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

fn save_tiff(image: &DynamicImage, path: &Path, metadata: &MetadataBlock) -> Result<(), BackendError> {
    let (w, h) = (image.width(), image.height());
    match image {
        DynamicImage::ImageLuma8(buf) => write_tiff::<colortype::Gray8>(path, w, h, buf, metadata),
        DynamicImage::ImageLuma16(buf) => write_tiff::<colortype::Gray16>(path, w, h, buf, metadata),
        DynamicImage::ImageRgb8(buf) => write_tiff::<colortype::RGB8>(path, w, h, buf, metadata),
        DynamicImage::ImageRgb16(buf) => write_tiff::<colortype::RGB16>(path, w, h, buf, metadata),
        DynamicImage::ImageRgba8(buf) => write_tiff::<colortype::RGBA8>(path, w, h, buf, metadata),
        DynamicImage::ImageRgba16(buf) => write_tiff::<colortype::RGBA16>(path, w, h, buf, metadata),
        DynamicImage::ImageRgb32F(buf) => {
            write_tiff::<colortype::RGB32Float>(path, w, h, buf, metadata)
        }
        DynamicImage::ImageRgba32F(buf) => {
            write_tiff::<colortype::RGBA32Float>(path, w, h, buf, metadata)
        }
        // TIFF has no gray+alpha color type in the encoder; widen to RGBA.
        DynamicImage::ImageLumaA16(_) => {
            write_tiff::<colortype::RGBA16>(path, w, h, &image.to_rgba16(), metadata)
        }
        _ => write_tiff::<colortype::RGBA8>(path, w, h, &image.to_rgba8(), metadata),
    }
}

fn write_tiff<C: colortype::ColorType>(
    path: &Path,
    width: u32,
    height: u32,
    data: &[C::Inner],
    metadata: &MetadataBlock,
) -> Result<(), BackendError>
where
    [C::Inner]: TiffValue,
{
    let file = File::create(path)?;
    let mut tiff = TiffEncoder::new(BufWriter::new(file)).map_err(|e| encode_failed(path, e))?;
    let mut img = tiff
        .new_image::<C>(width, height)
        .map_err(|e| encode_failed(path, e))?;

    let (xn, xd) = to_rational(metadata.x_resolution);
    let (yn, yd) = to_rational(metadata.y_resolution);
    img.resolution_unit(ResolutionUnit::None);
    img.x_resolution(Rational { n: xn, d: xd });
    img.y_resolution(Rational { n: yn, d: yd });

    img.encoder()
        .write_tag(Tag::ImageDescription, metadata_text(&metadata.description).as_str())
        .map_err(|e| encode_failed(path, e))?;
    let software = metadata_text(&metadata.software);
    if !software.is_empty() {
        img.encoder()
            .write_tag(Tag::Software, software.as_str())
            .map_err(|e| encode_failed(path, e))?;
    }

    img.write_data(data).map_err(|e| encode_failed(path, e))
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

fn save_png(image: &DynamicImage, path: &Path, metadata: &MetadataBlock) -> Result<(), BackendError> {
    use png::{BitDepth, ColorType};

    let (w, h) = (image.width(), image.height());
    let (color, depth, bytes): (ColorType, BitDepth, Vec<u8>) = match image {
        DynamicImage::ImageLuma8(buf) => (ColorType::Grayscale, BitDepth::Eight, buf.to_vec()),
        DynamicImage::ImageLumaA8(buf) => (ColorType::GrayscaleAlpha, BitDepth::Eight, buf.to_vec()),
        DynamicImage::ImageRgb8(buf) => (ColorType::Rgb, BitDepth::Eight, buf.to_vec()),
        DynamicImage::ImageRgba8(buf) => (ColorType::Rgba, BitDepth::Eight, buf.to_vec()),
        DynamicImage::ImageLuma16(buf) => (ColorType::Grayscale, BitDepth::Sixteen, be_bytes(buf)),
        DynamicImage::ImageLumaA16(buf) => {
            (ColorType::GrayscaleAlpha, BitDepth::Sixteen, be_bytes(buf))
        }
        DynamicImage::ImageRgb16(buf) => (ColorType::Rgb, BitDepth::Sixteen, be_bytes(buf)),
        DynamicImage::ImageRgba16(buf) => (ColorType::Rgba, BitDepth::Sixteen, be_bytes(buf)),
        // PNG has no float samples; keep 16 bits of precision.
        DynamicImage::ImageRgb32F(_) => (ColorType::Rgb, BitDepth::Sixteen, be_bytes(&image.to_rgb16())),
        _ => (ColorType::Rgba, BitDepth::Sixteen, be_bytes(&image.to_rgba16())),
    };

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), w, h);
    encoder.set_color(color);
    encoder.set_depth(depth);
    if let Some((xppu, yppu)) = metadata.pixels_per_meter {
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu,
            yppu,
            unit: png::Unit::Meter,
        }));
    }
    encoder
        .add_text_chunk("Description".to_string(), metadata_text(&metadata.description))
        .map_err(|e| encode_failed(path, e))?;
    let software = metadata_text(&metadata.software);
    if !software.is_empty() {
        encoder
            .add_text_chunk("Software".to_string(), software)
            .map_err(|e| encode_failed(path, e))?;
    }

    let mut writer = encoder.write_header().map_err(|e| encode_failed(path, e))?;
    writer
        .write_image_data(&bytes)
        .map_err(|e| encode_failed(path, e))?;
    writer.finish().map_err(|e| encode_failed(path, e))
}

/// PNG stores 16-bit samples big-endian.
fn be_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

impl ImageBackend for RustBackend {
    fn load(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        let mut reader = ImageReader::open(path).map_err(BackendError::Io)?;
        // Stitched mosaics routinely exceed the default decoder limits.
        reader.no_limits();
        reader.decode().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
    }

    fn save(
        &self,
        image: &DynamicImage,
        path: &Path,
        metadata: &MetadataBlock,
    ) -> Result<(), BackendError> {
        match extension(path).as_str() {
            "tif" | "tiff" => save_tiff(image, path, metadata),
            "png" => save_png(image, path, metadata),
            other => Err(BackendError::ProcessingFailed(format!(
                "Unsupported output format: {}",
                other
            ))),
        }
    }
}
