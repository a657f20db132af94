//! # Tile Stitch
//!
//! Stitches a rectangular grid of micrograph tiles (TIFF or PNG) into one
//! composite image, keeping the physical pixel scale so microscopy viewers
//! still measure correctly.
//!
//! # Architecture: Two-Stage Pipeline
//!
//! ```text
//! 1. Scan    tile directory  →  TileSet         (sorted tile paths, one file type)
//! 2. Stitch  TileSet + config →  result file    (+ thumbnail)
//! ```
//!
//! The scan stage never opens an image; the stitch stage validates the tile
//! count against the grid before it loads anything.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1: lists the tile directory, locks the file type, orders tiles |
//! | [`stitch`] | Stage 2: validates, composes, crops, writes the result and thumbnail |
//! | [`imaging`] | Grid math, in-memory pixel operations, decode/encode backend |
//! | [`scaling`] | Physical pixel scale: detection from tiles, ImageJ metadata for output |
//! | [`config`] | `stitch.toml` loading, merging with CLI flags, validation |
//! | [`output`] | CLI output formatting for both stages |
//!
//! # Design Decisions
//!
//! ## Non-Uniform Grids
//!
//! Tiles from a microscope are usually the same size, but edge tiles of a
//! cropped acquisition are not. Each column takes the width of its widest
//! tile and each row the height of its tallest, so nothing overlaps and the
//! canvas is exactly the sum of the column widths by the sum of the row
//! heights.
//!
//! ## Injected Collaborators
//!
//! Decoding/encoding ([`imaging::ImageBackend`]) and scale handling
//! ([`scaling::ScalingService`]) are traits passed to
//! [`stitch::stitch_with`]. Tests drive the whole compositor with an
//! in-memory mock backend; the binary uses [`stitch::stitch`], which wires
//! in the pure-Rust implementations.
//!
//! ## Progress as Events
//!
//! The library never prints. [`stitch::StitchEvent`]s go to a callback and
//! [`output`] turns them into lines.

pub mod config;
pub mod imaging;
pub mod output;
pub mod scaling;
pub mod scan;
pub mod stitch;

#[cfg(test)]
pub(crate) mod test_helpers;
