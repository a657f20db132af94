//! CLI output formatting for both stages.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Tiles (3 PNG, 1 empty)
//!     Source: /data/sample-042
//!     001 tile_00.png
//!     002 EMPTY
//!     003 tile_01.png
//!     004 tile_02.png
//! ```
//!
//! ## Stitch
//!
//! ```text
//! Grid 2 x 2, horizontal
//! Scaling: 2.5 nm/px (detected, FEI)
//! Canvas: 4096 x 3072
//! Cropped: 4000 x 3000
//! Result: /data/sample-042.png (4000 x 3000)
//! Thumbnail: /data/thumbnails/sample-042.png (2000 x 1500)
//! ```
//!
//! With `--debug`, per-tile lines are interleaved:
//!
//! ```text
//!     001 loaded tile_00.png (1024 x 768)
//!     001 pasted at column 1, row 1 (0, 0)
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::config::StitchConfig;
use crate::scan::{Tile, TileSet};
use crate::stitch::{OutputKind, StitchEvent};
use std::path::Path;

/// Format a 0-based index as a 1-based, 3-digit zero-padded position.
fn format_index(index: usize) -> String {
    format!("{:0>3}", index + 1)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Trim trailing zeros so `2.50` prints as `2.5` and `1.0` as `1`.
fn format_number(value: f64) -> String {
    let s = format!("{:.6}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

// ============================================================================
// Stage 1: Scan output
// ============================================================================

/// Real tiles and EMPTY slots are counted separately in the header.
pub fn format_scan_summary(tiles: &TileSet) -> Vec<String> {
    let images = tiles.image_count();
    let mut header = match tiles.file_type {
        Some(file_type) => format!("{} {}", images, file_type.label()),
        None => "none".to_string(),
    };
    let empty = tiles.count() - images;
    if empty > 0 {
        header.push_str(&format!(", {} empty", empty));
    }
    let mut lines = vec![
        format!("Tiles ({})", header),
        format!("    Source: {}", tiles.directory.display()),
    ];
    for (index, tile) in tiles.tiles.iter().enumerate() {
        let name = match tile {
            Tile::Image(path) => file_name(path),
            Tile::Empty => "EMPTY".to_string(),
        };
        lines.push(format!("    {} {}", format_index(index), name));
    }
    lines
}

pub fn print_scan_summary(tiles: &TileSet) {
    for line in format_scan_summary(tiles) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 2: Stitch output
// ============================================================================

/// Summarize the settings a run will use. Defaults that change nothing
/// (no crop, no shrink) are omitted.
pub fn format_config_summary(config: &StitchConfig) -> Vec<String> {
    let mut lines = vec![format!(
        "Grid {} x {}, {}",
        config.columns,
        config.rows,
        config.direction.name()
    )];
    if config.scale_factor < 1.0 {
        lines.push(format!(
            "    Tile scale: {}",
            format_number(config.scale_factor)
        ));
    }
    if config.crop.width > 0 {
        let height = match config.crop.height {
            0 => "full".to_string(),
            h => h.to_string(),
        };
        lines.push(format!("    Crop: {} x {}", config.crop.width, height));
    }
    if config.thumbnail.enabled {
        lines.push(format!(
            "    Thumbnail: wider than {}px",
            config.thumbnail.max_width
        ));
    }
    lines
}

pub fn print_config_summary(config: &StitchConfig) {
    for line in format_config_summary(config) {
        println!("{}", line);
    }
}

/// Format a single stitch progress event as display lines.
///
/// Per-tile events produce no lines unless `verbose` is set.
pub fn format_stitch_event(event: &StitchEvent, verbose: bool) -> Vec<String> {
    if event.is_detail() && !verbose {
        return Vec::new();
    }
    let line = match event {
        StitchEvent::ScalingResolved {
            descriptor,
            detected,
        } => {
            let source = if *detected { "detected" } else { "default" };
            let scale = if descriptor.x == descriptor.y {
                format_number(descriptor.x)
            } else {
                format!(
                    "{} x {}",
                    format_number(descriptor.x),
                    format_number(descriptor.y)
                )
            };
            format!(
                "Scaling: {} {}/px ({}, {})",
                scale, descriptor.unit, source, descriptor.editor
            )
        }
        StitchEvent::TileLoaded {
            index,
            path,
            width,
            height,
        } => {
            let name = path
                .as_deref()
                .map(file_name)
                .unwrap_or_else(|| "EMPTY".to_string());
            format!(
                "    {} loaded {} ({} x {})",
                format_index(*index),
                name,
                width,
                height
            )
        }
        StitchEvent::TileResized {
            index,
            width,
            height,
        } => format!(
            "    {} resized to {} x {}",
            format_index(*index),
            width,
            height
        ),
        StitchEvent::TilePasted {
            index,
            column,
            row,
            x,
            y,
        } => format!(
            "    {} pasted at column {}, row {} ({}, {})",
            format_index(*index),
            column + 1,
            row + 1,
            x,
            y
        ),
        StitchEvent::CanvasComposed { width, height, .. } => {
            format!("Canvas: {} x {}", width, height)
        }
        StitchEvent::Cropped { width, height } => format!("Cropped: {} x {}", width, height),
        StitchEvent::Saved {
            kind,
            path,
            width,
            height,
        } => {
            let label = match kind {
                OutputKind::Result => "Result",
                OutputKind::Thumbnail => "Thumbnail",
            };
            format!("{}: {} ({} x {})", label, path.display(), width, height)
        }
    };
    vec![line]
}

pub fn print_stitch_event(event: &StitchEvent, verbose: bool) {
    for line in format_stitch_event(event, verbose) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Direction;
    use crate::scaling::ScalingDescriptor;
    use crate::scan::FileType;
    use std::path::PathBuf;

    #[test]
    fn format_index_is_one_based() {
        assert_eq!(format_index(0), "001");
        assert_eq!(format_index(41), "042");
        assert_eq!(format_index(999), "1000");
    }

    #[test]
    fn format_number_trims_zeros() {
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.125), "0.125");
    }

    // =========================================================================
    // Scan output
    // =========================================================================

    #[test]
    fn scan_summary_lists_tiles_and_placeholders() {
        let tiles = TileSet {
            directory: PathBuf::from("/data/sample"),
            file_type: Some(FileType::Png),
            tiles: vec![
                Tile::Image(PathBuf::from("/data/sample/a.png")),
                Tile::Empty,
            ],
        };
        let lines = format_scan_summary(&tiles);
        assert_eq!(
            lines,
            vec![
                "Tiles (1 PNG, 1 empty)",
                "    Source: /data/sample",
                "    001 a.png",
                "    002 EMPTY",
            ]
        );
    }

    #[test]
    fn scan_summary_header_without_empty_slots() {
        let tiles = TileSet {
            directory: PathBuf::from("/data/sample"),
            file_type: Some(FileType::Tiff),
            tiles: vec![
                Tile::Image(PathBuf::from("/data/sample/a.tif")),
                Tile::Image(PathBuf::from("/data/sample/b.tif")),
            ],
        };
        assert_eq!(format_scan_summary(&tiles)[0], "Tiles (2 TIFF)");
    }

    #[test]
    fn scan_summary_of_directory_without_tiles() {
        let tiles = TileSet {
            directory: PathBuf::from("/data/sample"),
            file_type: None,
            tiles: vec![],
        };
        assert_eq!(
            format_scan_summary(&tiles),
            vec!["Tiles (none)", "    Source: /data/sample"]
        );
    }

    // =========================================================================
    // Config output
    // =========================================================================

    #[test]
    fn config_summary_default_is_one_line() {
        let lines = format_config_summary(&StitchConfig::default());
        assert_eq!(lines, vec!["Grid 2 x 2, horizontal"]);
    }

    #[test]
    fn config_summary_shows_active_options() {
        let mut config = StitchConfig {
            columns: 3,
            rows: 1,
            direction: Direction::Vertical,
            scale_factor: 0.5,
            ..StitchConfig::default()
        };
        config.crop.width = 100;
        config.thumbnail.enabled = true;

        let lines = format_config_summary(&config);
        assert_eq!(lines[0], "Grid 3 x 1, vertical");
        assert_eq!(lines[1], "    Tile scale: 0.5");
        assert_eq!(lines[2], "    Crop: 100 x full");
        assert_eq!(lines[3], "    Thumbnail: wider than 2000px");
    }

    // =========================================================================
    // Stitch event formatting
    // =========================================================================

    #[test]
    fn detail_events_hidden_unless_verbose() {
        let event = StitchEvent::TilePasted {
            index: 2,
            column: 0,
            row: 1,
            x: 0,
            y: 50,
        };
        assert!(format_stitch_event(&event, false).is_empty());
        assert_eq!(
            format_stitch_event(&event, true),
            vec!["    003 pasted at column 1, row 2 (0, 50)"]
        );
    }

    #[test]
    fn tile_loaded_names_file_or_placeholder() {
        let loaded = StitchEvent::TileLoaded {
            index: 0,
            path: Some(PathBuf::from("/data/sample/tile_00.tif")),
            width: 1024,
            height: 768,
        };
        assert_eq!(
            format_stitch_event(&loaded, true),
            vec!["    001 loaded tile_00.tif (1024 x 768)"]
        );

        let empty = StitchEvent::TileLoaded {
            index: 1,
            path: None,
            width: 1024,
            height: 768,
        };
        assert_eq!(
            format_stitch_event(&empty, true),
            vec!["    002 loaded EMPTY (1024 x 768)"]
        );
    }

    #[test]
    fn scaling_line_shows_source() {
        let event = StitchEvent::ScalingResolved {
            descriptor: ScalingDescriptor {
                x: 2.5,
                y: 2.5,
                unit: "nm".into(),
                editor: "FEI".into(),
            },
            detected: true,
        };
        assert_eq!(
            format_stitch_event(&event, false),
            vec!["Scaling: 2.5 nm/px (detected, FEI)"]
        );
    }

    #[test]
    fn anisotropic_scaling_shows_both_axes() {
        let event = StitchEvent::ScalingResolved {
            descriptor: ScalingDescriptor {
                x: 1.0,
                y: 2.0,
                unit: "µm".into(),
                editor: "FEI-MAPS".into(),
            },
            detected: false,
        };
        assert_eq!(
            format_stitch_event(&event, false),
            vec!["Scaling: 1 x 2 µm/px (default, FEI-MAPS)"]
        );
    }

    #[test]
    fn saved_events_label_kind() {
        let result = StitchEvent::Saved {
            kind: OutputKind::Result,
            path: PathBuf::from("/out/sample.png"),
            width: 200,
            height: 100,
        };
        let thumb = StitchEvent::Saved {
            kind: OutputKind::Thumbnail,
            path: PathBuf::from("/out/thumbnails/sample.png"),
            width: 100,
            height: 50,
        };
        assert_eq!(
            format_stitch_event(&result, false),
            vec!["Result: /out/sample.png (200 x 100)"]
        );
        assert_eq!(
            format_stitch_event(&thumb, false),
            vec!["Thumbnail: /out/thumbnails/sample.png (100 x 50)"]
        );
    }

    #[test]
    fn canvas_and_crop_lines() {
        let canvas = StitchEvent::CanvasComposed {
            columns: 2,
            rows: 2,
            width: 200,
            height: 100,
        };
        let cropped = StitchEvent::Cropped {
            width: 150,
            height: 60,
        };
        assert_eq!(format_stitch_event(&canvas, false), vec!["Canvas: 200 x 100"]);
        assert_eq!(format_stitch_event(&cropped, false), vec!["Cropped: 150 x 60"]);
    }
}
