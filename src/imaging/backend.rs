//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the compositor needs
//! from the host: decode a tile from disk, and encode a finished image
//! together with its scaling [`MetadataBlock`].
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust, built on the
//! `image`, `tiff` and `png` crates.

use crate::scaling::MetadataBlock;
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image backends.
///
/// Everything pixel-related (placement, cropping, resizing) happens in memory
/// on [`DynamicImage`]; only decoding and encoding go through the backend, so
/// tests can swap in a mock without touching the filesystem.
pub trait ImageBackend {
    /// Decode an image file.
    fn load(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Encode `image` to `path`, embedding `metadata`. The format follows the
    /// path's extension.
    fn save(
        &self,
        image: &DynamicImage,
        path: &Path,
        metadata: &MetadataBlock,
    ) -> Result<(), BackendError>;
}
