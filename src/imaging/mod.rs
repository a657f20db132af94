//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Grid layout** | pure calculations ([`GridLayout`]) |
//! | **Paste / crop / resize** | `image::imageops` |
//! | **Encode + scaling tags** | `tiff` / `png` encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for grid and dimension math (unit testable)
//! - **Operations**: In-memory pixel work on `DynamicImage`
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod operations;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{
    GridLayout, Placement, ThumbnailPlan, crop_dimensions, grid_cell, plan_thumbnail,
    scaled_dimensions,
};
pub use rust_backend::RustBackend;
