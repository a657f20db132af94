//! Pure calculation functions for grid layout and output dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::config::Direction;

/// Map a flat tile index onto its `(column, row)` grid cell.
///
/// - Horizontal: row-major fill, left to right then the next row.
/// - Vertical: column-major fill, top to bottom then the next column.
///
/// # Examples
/// ```
/// # use tile_stitch::config::Direction;
/// # use tile_stitch::imaging::grid_cell;
/// assert_eq!(grid_cell(3, Direction::Horizontal, 2, 3), (1, 1));
/// assert_eq!(grid_cell(3, Direction::Vertical, 2, 3), (1, 0));
/// ```
pub fn grid_cell(index: usize, direction: Direction, columns: usize, rows: usize) -> (usize, usize) {
    match direction {
        Direction::Horizontal => (index % columns, index / columns),
        Direction::Vertical => (index / rows, index % rows),
    }
}

/// Shrink dimensions by `factor`, rounding down.
///
/// Factors of 1 or more leave the dimensions untouched; tiles are never
/// upscaled. The result is at least 1×1.
pub fn scaled_dimensions(dims: (u32, u32), factor: f64) -> (u32, u32) {
    if factor >= 1.0 {
        return dims;
    }
    let (w, h) = dims;
    (
        ((w as f64 * factor) as u32).max(1),
        ((h as f64 * factor) as u32).max(1),
    )
}

/// Column widths, row heights and their cumulative offsets for one grid.
///
/// `col_offsets` and `row_offsets` carry one more entry than there are
/// columns/rows: the last entry is the canvas extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    pub direction: Direction,
    pub col_widths: Vec<u32>,
    pub row_heights: Vec<u32>,
    pub col_offsets: Vec<u32>,
    pub row_offsets: Vec<u32>,
}

impl GridLayout {
    /// Measure a grid from per-tile dimensions given in tile-list order.
    ///
    /// Each column is as wide as its widest tile and each row as tall as its
    /// tallest, so heterogeneous tile sizes never overlap. Entries past
    /// `columns * rows` have no cell and are ignored.
    pub fn measure(dims: &[(u32, u32)], columns: usize, rows: usize, direction: Direction) -> Self {
        let mut col_widths = vec![0u32; columns];
        let mut row_heights = vec![0u32; rows];

        for (index, &(w, h)) in dims.iter().enumerate().take(columns * rows) {
            let (c, r) = grid_cell(index, direction, columns, rows);
            col_widths[c] = col_widths[c].max(w);
            row_heights[r] = row_heights[r].max(h);
        }

        Self {
            direction,
            col_offsets: prefix_sums(&col_widths),
            row_offsets: prefix_sums(&row_heights),
            col_widths,
            row_heights,
        }
    }

    pub fn columns(&self) -> usize {
        self.col_widths.len()
    }

    pub fn rows(&self) -> usize {
        self.row_heights.len()
    }

    /// Total canvas size `(width, height)`.
    pub fn canvas_size(&self) -> (u32, u32) {
        (
            self.col_offsets.last().copied().unwrap_or(0),
            self.row_offsets.last().copied().unwrap_or(0),
        )
    }

    /// Grid cell and top-left paste position of tile `index`.
    pub fn placement(&self, index: usize) -> Placement {
        let (column, row) = grid_cell(index, self.direction, self.columns(), self.rows());
        Placement {
            column,
            row,
            x: self.col_offsets[column],
            y: self.row_offsets[row],
        }
    }
}

/// Where a single tile lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub column: usize,
    pub row: usize,
    pub x: u32,
    pub y: u32,
}

fn prefix_sums(extents: &[u32]) -> Vec<u32> {
    let mut sums = Vec::with_capacity(extents.len() + 1);
    let mut total = 0u32;
    sums.push(total);
    for &extent in extents {
        total += extent;
        sums.push(total);
    }
    sums
}

/// Decide whether and how far to crop a composed canvas.
///
/// Returns `None` when cropping is disabled (`crop_width == 0`) or when the
/// requested box already covers the canvas. A `crop_height` of 0 keeps the
/// canvas height. The returned size never exceeds the canvas.
pub fn crop_dimensions(canvas: (u32, u32), crop_width: u32, crop_height: u32) -> Option<(u32, u32)> {
    if crop_width == 0 {
        return None;
    }
    let (canvas_w, canvas_h) = canvas;
    let crop_height = if crop_height == 0 { canvas_h } else { crop_height };
    if crop_width < canvas_w || crop_height < canvas_h {
        Some((crop_width.min(canvas_w), crop_height.min(canvas_h)))
    } else {
        None
    }
}

/// Target size of a thumbnail and the shrink factor that produces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailPlan {
    pub shrink: f64,
    pub width: u32,
    pub height: u32,
}

/// Plan a thumbnail for a canvas wider than `max_width`.
///
/// Only the width is checked: a tall, narrow canvas gets no thumbnail.
pub fn plan_thumbnail(canvas: (u32, u32), max_width: u32) -> Option<ThumbnailPlan> {
    let (w, h) = canvas;
    if w <= max_width {
        return None;
    }
    let shrink = max_width as f64 / w as f64;
    Some(ThumbnailPlan {
        shrink,
        width: max_width,
        height: ((shrink * h as f64) as u32).max(1),
    })
}
