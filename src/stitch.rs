//! Grid composition.
//!
//! Stage 2 of a stitch run. Takes the ordered [`TileSet`] from the scan stage
//! and composes it into one image, then writes the result (and optionally a
//! thumbnail) with the physical pixel scale embedded.
//!
//! ## Pipeline
//!
//! ```text
//! validate count → detect scale → load tiles → shrink → measure grid
//!   → paste onto canvas → crop → save result → save thumbnail
//! ```
//!
//! Columns are as wide as their widest tile and rows as tall as their tallest,
//! so tiles of unequal size never overlap; gaps stay white.
//!
//! ## Output Structure
//!
//! ```text
//! <output dir>/
//! ├── sample-042.tif            # Composed result
//! └── thumbnails/
//!     └── sample-042.tif        # Only when enabled and the result is wide
//! ```
//!
//! Everything runs on the calling thread. Progress is reported through a
//! caller-supplied callback as [`StitchEvent`]s.

use crate::config::StitchConfig;
use crate::imaging::operations::{self, blank_canvas, placeholder};
use crate::imaging::{
    BackendError, GridLayout, ImageBackend, RustBackend, crop_dimensions, plan_thumbnail,
    scaled_dimensions,
};
use crate::scaling::{ImageJScaling, ScalingDescriptor, ScalingService};
use crate::scan::{Tile, TileSet};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Subdirectory of the output directory that receives thumbnails.
pub const THUMBNAIL_DIR: &str = "thumbnails";

/// Base name used when the tile directory has no name of its own (`/`).
const FALLBACK_NAME: &str = "result";

#[derive(Error, Debug)]
pub enum StitchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Expected {expected} tiles for the grid but found {found}")]
    TileCountMismatch { expected: usize, found: usize },
    #[error("Every grid slot is empty; nothing to stitch")]
    NoTilesFound,
}

/// Which file a [`StitchEvent::Saved`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Result,
    Thumbnail,
}

/// Progress reported during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StitchEvent {
    /// The scale that will be embedded; `detected` is false for the fallback.
    ScalingResolved {
        descriptor: ScalingDescriptor,
        detected: bool,
    },
    /// A slot was filled. `path` is `None` for a placeholder.
    TileLoaded {
        index: usize,
        path: Option<PathBuf>,
        width: u32,
        height: u32,
    },
    TileResized {
        index: usize,
        width: u32,
        height: u32,
    },
    TilePasted {
        index: usize,
        column: usize,
        row: usize,
        x: u32,
        y: u32,
    },
    CanvasComposed {
        columns: usize,
        rows: usize,
        width: u32,
        height: u32,
    },
    Cropped {
        width: u32,
        height: u32,
    },
    Saved {
        kind: OutputKind,
        path: PathBuf,
        width: u32,
        height: u32,
    },
}

impl StitchEvent {
    /// Per-tile detail, shown only in debug output.
    pub fn is_detail(&self) -> bool {
        matches!(
            self,
            StitchEvent::TileLoaded { .. }
                | StitchEvent::TileResized { .. }
                | StitchEvent::TilePasted { .. }
        )
    }
}

/// What a successful run wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchResult {
    pub output: PathBuf,
    pub thumbnail: Option<PathBuf>,
    /// Final (possibly cropped) result size.
    pub width: u32,
    pub height: u32,
    pub scaling: ScalingDescriptor,
}

/// Stitch with the production backend and scaling service.
pub fn stitch(
    tiles: &TileSet,
    config: &StitchConfig,
    progress: impl FnMut(&StitchEvent),
) -> Result<StitchResult, StitchError> {
    stitch_with(
        &RustBackend::new(),
        &ImageJScaling::new(),
        tiles,
        config,
        progress,
    )
}

/// Stitch using a specific backend and scaling service (allows testing with
/// mocks).
pub fn stitch_with(
    backend: &impl ImageBackend,
    scaling: &impl ScalingService,
    tiles: &TileSet,
    config: &StitchConfig,
    mut progress: impl FnMut(&StitchEvent),
) -> Result<StitchResult, StitchError> {
    let expected = config.tile_count();
    if tiles.count() != expected {
        return Err(StitchError::TileCountMismatch {
            expected,
            found: tiles.count(),
        });
    }
    let (first_index, first_path) = tiles
        .tiles
        .iter()
        .enumerate()
        .find_map(|(i, t)| t.path().map(|p| (i, p)))
        .ok_or(StitchError::NoTilesFound)?;
    let file_type = tiles.file_type.ok_or(StitchError::NoTilesFound)?;

    let descriptor = resolve_scaling(scaling, first_path, &tiles.directory, config, &mut progress);

    let images = load_tiles(backend, tiles, first_index, config.scale_factor, &mut progress)?;

    let dims: Vec<(u32, u32)> = images.iter().map(|i| (i.width(), i.height())).collect();
    let layout = GridLayout::measure(
        &dims,
        config.columns as usize,
        config.rows as usize,
        config.direction,
    );
    let (canvas_w, canvas_h) = layout.canvas_size();
    let mut canvas = blank_canvas(images[first_index].color(), canvas_w, canvas_h);

    for (index, tile) in images.into_iter().enumerate() {
        let placement = layout.placement(index);
        operations::paste(&mut canvas, &tile, placement.x, placement.y)?;
        progress(&StitchEvent::TilePasted {
            index,
            column: placement.column,
            row: placement.row,
            x: placement.x,
            y: placement.y,
        });
    }
    progress(&StitchEvent::CanvasComposed {
        columns: layout.columns(),
        rows: layout.rows(),
        width: canvas_w,
        height: canvas_h,
    });

    if let Some((w, h)) = crop_dimensions((canvas_w, canvas_h), config.crop.width, config.crop.height) {
        canvas = operations::crop_top_left(&canvas, w, h);
        progress(&StitchEvent::Cropped {
            width: w,
            height: h,
        });
    }

    let (output_dir, base_name) = output_location(tiles, config);
    let file_name = format!("{}{}", base_name, file_type.extension());
    std::fs::create_dir_all(&output_dir)?;

    let output = output_dir.join(&file_name);
    backend.save(&canvas, &output, &scaling.encode(&descriptor))?;
    progress(&StitchEvent::Saved {
        kind: OutputKind::Result,
        path: output.clone(),
        width: canvas.width(),
        height: canvas.height(),
    });

    let thumbnail = if config.thumbnail.enabled {
        write_thumbnail(
            backend,
            scaling,
            &canvas,
            &descriptor,
            &output_dir.join(THUMBNAIL_DIR),
            &file_name,
            config.thumbnail.max_width,
            &mut progress,
        )?
    } else {
        None
    };

    Ok(StitchResult {
        output,
        thumbnail,
        width: canvas.width(),
        height: canvas.height(),
        scaling: descriptor,
    })
}

fn resolve_scaling(
    scaling: &impl ScalingService,
    first_tile: &Path,
    directory: &Path,
    config: &StitchConfig,
    progress: &mut impl FnMut(&StitchEvent),
) -> ScalingDescriptor {
    let detected = first_tile
        .file_name()
        .and_then(|name| scaling.detect(&name.to_string_lossy(), directory));
    let (descriptor, detected) = match detected {
        Some(d) => (d, true),
        None => (config.scaling.descriptor(), false),
    };
    progress(&StitchEvent::ScalingResolved {
        descriptor: descriptor.clone(),
        detected,
    });
    descriptor
}

/// Load every slot in index order, substituting placeholders for empty
/// slots, then shrink by `scale_factor`.
fn load_tiles(
    backend: &impl ImageBackend,
    tiles: &TileSet,
    first_index: usize,
    scale_factor: f64,
    progress: &mut impl FnMut(&StitchEvent),
) -> Result<Vec<DynamicImage>, StitchError> {
    let first_path = tiles.tiles[first_index]
        .path()
        .ok_or(StitchError::NoTilesFound)?;
    // Placeholders take their shape from the first real tile, which may sit
    // after them in the grid.
    let reference = backend.load(first_path)?;
    let mut images = Vec::with_capacity(tiles.count());

    for (index, tile) in tiles.tiles.iter().enumerate() {
        let (image, path) = match tile {
            Tile::Image(path) if index == first_index => (reference.clone(), Some(path.clone())),
            Tile::Image(path) => (backend.load(path)?, Some(path.clone())),
            Tile::Empty => (placeholder(&reference), None),
        };
        progress(&StitchEvent::TileLoaded {
            index,
            path,
            width: image.width(),
            height: image.height(),
        });

        let (w, h) = scaled_dimensions((image.width(), image.height()), scale_factor);
        let image = if (w, h) != (image.width(), image.height()) {
            progress(&StitchEvent::TileResized {
                index,
                width: w,
                height: h,
            });
            operations::resize(&image, w, h)
        } else {
            image
        };
        images.push(image);
    }
    Ok(images)
}

/// Output directory and base name: configured values, else the tile
/// directory's parent and name.
fn output_location(tiles: &TileSet, config: &StitchConfig) -> (PathBuf, String) {
    let directory = config.output.directory.clone().unwrap_or_else(|| {
        tiles
            .directory
            .parent()
            .unwrap_or(&tiles.directory)
            .to_path_buf()
    });
    let name = config.output.name.clone().unwrap_or_else(|| {
        tiles
            .directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    });
    (directory, name)
}

#[allow(clippy::too_many_arguments)]
fn write_thumbnail(
    backend: &impl ImageBackend,
    scaling: &impl ScalingService,
    canvas: &DynamicImage,
    descriptor: &ScalingDescriptor,
    thumbnail_dir: &Path,
    file_name: &str,
    max_width: u32,
    progress: &mut impl FnMut(&StitchEvent),
) -> Result<Option<PathBuf>, StitchError> {
    let Some(plan) = plan_thumbnail((canvas.width(), canvas.height()), max_width) else {
        return Ok(None);
    };
    let thumbnail = operations::resize(canvas, plan.width, plan.height);
    let metadata = scaling.encode(&descriptor.for_thumbnail(plan.shrink));

    std::fs::create_dir_all(thumbnail_dir)?;
    let path = thumbnail_dir.join(file_name);
    backend.save(&thumbnail, &path, &metadata)?;
    progress(&StitchEvent::Saved {
        kind: OutputKind::Thumbnail,
        path: path.clone(),
        width: plan.width,
        height: plan.height,
    });
    Ok(Some(path))
}

/// Open `path` in the platform's default viewer.
///
/// Waits for the launcher (not the viewer) to exit; a non-zero launcher exit
/// is reported as an error.
pub fn open_in_viewer(path: &Path) -> std::io::Result<()> {
    use std::process::Command;

    let status = if cfg!(target_os = "macos") {
        Command::new("open").arg(path).status()?
    } else if cfg!(target_os = "windows") {
        Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(path)
            .status()?
    } else {
        Command::new("xdg-open").arg(path).status()?
    };

    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!(
            "viewer launcher exited with {status}"
        )))
    }
}
