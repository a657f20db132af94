//! Tile discovery.
//!
//! Stage 1 of a stitch run. Lists one directory and returns the tile files
//! that will fill the grid, in the order they will be placed.
//!
//! ## Directory Layout
//!
//! ```text
//! sample-042/              # Working directory; also the default result name
//! ├── stitch.toml          # Run configuration (optional)
//! ├── tile_00.tif          # First match locks the file type to TIFF
//! ├── tile_01.TIF          # Extensions match case-insensitively
//! ├── tile_02.tif
//! ├── tile_03.tif
//! ├── overview.png         # Different type: skipped
//! └── notes.txt            # Not a tile: skipped
//! ```
//!
//! ## Rules
//!
//! - Entries are visited in lexicographic file-name order.
//! - Only `.tif` and `.png` files are tiles.
//! - The first tile found fixes the [`FileType`]; tiles of the other type
//!   are ignored.
//! - Subdirectories are not descended into.
//! - File contents are never opened here.
//! - A directory without tiles yields an empty set; the stitch stage
//!   rejects it as a count mismatch.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Image family of a tile set. Results are written in the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Tiff,
    Png,
}

impl FileType {
    /// Map a file extension (without the dot, any case) to a tile type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "tif" => Some(FileType::Tiff),
            "png" => Some(FileType::Png),
            _ => None,
        }
    }

    /// Extension used for written results, with the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Tiff => ".tif",
            FileType::Png => ".png",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileType::Tiff => "TIFF",
            FileType::Png => "PNG",
        }
    }
}

/// One grid slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tile {
    Image(PathBuf),
    /// No tile here; rendered as a black cell.
    Empty,
}

impl Tile {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Tile::Image(path) => Some(path),
            Tile::Empty => None,
        }
    }
}

/// Ordered tiles of one directory.
#[derive(Debug, Clone)]
pub struct TileSet {
    /// Absolute tile directory.
    pub directory: PathBuf,
    /// `None` when the directory holds no tiles.
    pub file_type: Option<FileType>,
    pub tiles: Vec<Tile>,
}

impl TileSet {
    pub fn count(&self) -> usize {
        self.tiles.len()
    }

    /// Slots holding a real tile, i.e. [`count`](Self::count) minus empty
    /// slots.
    pub fn image_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.path().is_some()).count()
    }

    /// The first slot holding a real tile.
    pub fn first_image(&self) -> Option<&Path> {
        self.tiles.iter().find_map(Tile::path)
    }

    /// Insert [`Tile::Empty`] at the given grid indices.
    ///
    /// Slots are applied in ascending order so each index refers to the final
    /// position. Indices past the end pad the list.
    pub fn with_empty_slots(mut self, slots: &[usize]) -> Self {
        let mut slots = slots.to_vec();
        slots.sort_unstable();
        slots.dedup();
        for slot in slots {
            let at = slot.min(self.tiles.len());
            self.tiles.insert(at, Tile::Empty);
        }
        self
    }
}

/// List the tiles of `directory`.
pub fn enumerate(directory: &Path) -> Result<TileSet, ScanError> {
    if !directory.is_dir() {
        return Err(ScanError::NotADirectory(directory.to_path_buf()));
    }
    let directory = directory.canonicalize()?;

    let mut file_type = None;
    let mut tiles = Vec::new();

    let walker = WalkDir::new(&directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(kind) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FileType::from_extension)
        else {
            continue;
        };
        match file_type {
            None => file_type = Some(kind),
            Some(locked) if locked != kind => continue,
            Some(_) => {}
        }
        tiles.push(Tile::Image(path.to_path_buf()));
    }

    Ok(TileSet {
        directory,
        file_type,
        tiles,
    })
}
