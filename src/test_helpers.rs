//! Shared test utilities for the tile-stitch test suite.
//!
//! Provides synthetic tiles, pixel readers, and a helper that writes tile
//! files into a fixture directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_png_tile(tmp.path(), "tile_01.png", 100, 50, [255, 0, 0]);
//!
//! let tile = solid_rgb(4, 4, [1, 2, 3]);
//! assert_eq!(rgb_at(&tile, 3, 3), [1, 2, 3]);
//! ```

use image::{DynamicImage, ImageBuffer, Rgb};
use std::path::{Path, PathBuf};

// =========================================================================
// Synthetic images
// =========================================================================

/// An 8-bit RGB image filled with one color.
pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(color)))
}

/// The RGB value at `(x, y)`, converting from whatever the image holds.
pub fn rgb_at(image: &DynamicImage, x: u32, y: u32) -> [u8; 3] {
    image.to_rgb8().get_pixel(x, y).0
}

// =========================================================================
// Fixture files
// =========================================================================

/// Write a plain (unscaled) solid-color PNG tile into `dir`.
pub fn write_png_tile(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    solid_rgb(width, height, color).save(&path).unwrap();
    path
}

/// Create an empty placeholder file; enumeration never opens it.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}
