//! In-memory pixel operations used to compose the canvas.
//!
//! Every function keeps the sample depth of its input: a 16-bit grayscale
//! micrograph stays 16-bit through placeholder creation, pasting, cropping
//! and resizing.

use super::backend::BackendError;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};

/// Fill value for a solid image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shade {
    White,
    Black,
}

/// Create an opaque solid image of the given color type.
///
/// Color types without a native buffer representation fall back to RGBA8.
pub fn solid(color: ColorType, width: u32, height: u32, shade: Shade) -> DynamicImage {
    let (v8, v16, vf) = match shade {
        Shade::White => (u8::MAX, u16::MAX, 1.0f32),
        Shade::Black => (0, 0, 0.0),
    };
    match color {
        ColorType::L8 => ImageBuffer::from_pixel(width, height, Luma([v8])).into(),
        ColorType::L16 => ImageBuffer::from_pixel(width, height, Luma([v16])).into(),
        ColorType::La8 => ImageBuffer::from_pixel(width, height, LumaA([v8, u8::MAX])).into(),
        ColorType::La16 => ImageBuffer::from_pixel(width, height, LumaA([v16, u16::MAX])).into(),
        ColorType::Rgb8 => ImageBuffer::from_pixel(width, height, Rgb([v8; 3])).into(),
        ColorType::Rgb16 => ImageBuffer::from_pixel(width, height, Rgb([v16; 3])).into(),
        ColorType::Rgb32F => ImageBuffer::from_pixel(width, height, Rgb([vf; 3])).into(),
        ColorType::Rgba16 => {
            ImageBuffer::from_pixel(width, height, Rgba([v16, v16, v16, u16::MAX])).into()
        }
        ColorType::Rgba32F => ImageBuffer::from_pixel(width, height, Rgba([vf, vf, vf, 1.0])).into(),
        _ => ImageBuffer::from_pixel(width, height, Rgba([v8, v8, v8, u8::MAX])).into(),
    }
}

/// White background canvas in the color type of the first tile.
pub fn blank_canvas(color: ColorType, width: u32, height: u32) -> DynamicImage {
    solid(color, width, height, Shade::White)
}

/// Black stand-in for a missing tile, matching the reference tile's color
/// type and size.
pub fn placeholder(reference: &DynamicImage) -> DynamicImage {
    solid(
        reference.color(),
        reference.width(),
        reference.height(),
        Shade::Black,
    )
}

/// Convert `image` to `color`, borrowing when no conversion is needed.
pub fn convert_to(image: &DynamicImage, color: ColorType) -> std::borrow::Cow<'_, DynamicImage> {
    use std::borrow::Cow;
    if image.color() == color {
        return Cow::Borrowed(image);
    }
    Cow::Owned(match color {
        ColorType::L8 => image.to_luma8().into(),
        ColorType::L16 => image.to_luma16().into(),
        ColorType::La8 => image.to_luma_alpha8().into(),
        ColorType::La16 => image.to_luma_alpha16().into(),
        ColorType::Rgb8 => image.to_rgb8().into(),
        ColorType::Rgb16 => image.to_rgb16().into(),
        ColorType::Rgb32F => image.to_rgb32f().into(),
        ColorType::Rgba16 => image.to_rgba16().into(),
        ColorType::Rgba32F => image.to_rgba32f().into(),
        _ => image.to_rgba8().into(),
    })
}

/// Copy `tile` onto `canvas` with its top-left corner at `(x, y)`.
///
/// Pixels are replaced, not blended. The tile is converted to the canvas
/// color type first; parts falling outside the canvas are clipped.
pub fn paste(canvas: &mut DynamicImage, tile: &DynamicImage, x: u32, y: u32) -> Result<(), BackendError> {
    let tile = convert_to(tile, canvas.color());
    let (x, y) = (i64::from(x), i64::from(y));
    match (canvas, &*tile) {
        (DynamicImage::ImageLuma8(c), DynamicImage::ImageLuma8(t)) => imageops::replace(c, t, x, y),
        (DynamicImage::ImageLuma16(c), DynamicImage::ImageLuma16(t)) => imageops::replace(c, t, x, y),
        (DynamicImage::ImageLumaA8(c), DynamicImage::ImageLumaA8(t)) => imageops::replace(c, t, x, y),
        (DynamicImage::ImageLumaA16(c), DynamicImage::ImageLumaA16(t)) => imageops::replace(c, t, x, y),
        (DynamicImage::ImageRgb8(c), DynamicImage::ImageRgb8(t)) => imageops::replace(c, t, x, y),
        (DynamicImage::ImageRgb16(c), DynamicImage::ImageRgb16(t)) => imageops::replace(c, t, x, y),
        (DynamicImage::ImageRgb32F(c), DynamicImage::ImageRgb32F(t)) => imageops::replace(c, t, x, y),
        (DynamicImage::ImageRgba8(c), DynamicImage::ImageRgba8(t)) => imageops::replace(c, t, x, y),
        (DynamicImage::ImageRgba16(c), DynamicImage::ImageRgba16(t)) => imageops::replace(c, t, x, y),
        (DynamicImage::ImageRgba32F(c), DynamicImage::ImageRgba32F(t)) => imageops::replace(c, t, x, y),
        (canvas, tile) => {
            return Err(BackendError::ProcessingFailed(format!(
                "Cannot paste {:?} tile onto {:?} canvas",
                tile.color(),
                canvas.color()
            )));
        }
    }
    Ok(())
}

/// Resize to exact dimensions with Lanczos3 resampling.
pub fn resize(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    image.resize_exact(width, height, FilterType::Lanczos3)
}

/// Crop to `(width, height)` anchored at the origin.
pub fn crop_top_left(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    image.crop_imm(0, 0, width, height)
}
