//! Physical pixel scaling: detection from source tiles and the metadata block
//! embedded in every written file.
//!
//! Microscopy viewers (ImageJ/Fiji and friends) read the physical size of a
//! pixel from the image metadata. The stitcher reads that scale from the
//! first real tile, carries it through composition, and writes it back:
//!
//! | Format | Read from | Written as |
//! |---|---|---|
//! | TIFF | `ImageDescription` (`ImageJ=…`, `unit=…`) + `X/YResolution`, or FEI tags 34682/34680 | `ImageDescription`, `X/YResolution`, `ResolutionUnit=None`, `Software` |
//! | PNG | `tEXt Description` + metric `pHYs` | `tEXt Description`, `tEXt Software`, `pHYs` |
//!
//! [`ScalingService`] is the seam the compositor depends on;
//! [`ImageJScaling`] is the production implementation.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::Decoder as TiffDecoder;
use tiff::decoder::ifd::Value;
use tiff::tags::Tag;

/// ImageJ version string written into descriptions. Readers only check the
/// `ImageJ=` prefix.
const IMAGEJ_VERSION: &str = "1.11a";

/// FEI/Thermo Fisher SEM metadata tags (INI text with a `[Scan]` section).
const FEI_TAGS: [u16; 2] = [34682, 34680];

/// Physical size of one pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingDescriptor {
    /// Units per pixel along x.
    pub x: f64,
    /// Units per pixel along y.
    pub y: f64,
    pub unit: String,
    /// Provenance tag (the software that produced the scale).
    pub editor: String,
}

impl ScalingDescriptor {
    /// Scale of an image shrunk by `shrink` (e.g. 0.5 halves each side, so
    /// each pixel covers twice the distance).
    pub fn for_thumbnail(&self, shrink: f64) -> Self {
        Self {
            x: self.x / shrink,
            y: self.y / shrink,
            unit: self.unit.clone(),
            editor: self.editor.clone(),
        }
    }

    /// True for the "no scale" value: one pixel per pixel.
    pub fn is_unscaled(&self) -> bool {
        self.x == 1.0 && self.y == 1.0 && matches!(self.unit.as_str(), "" | "px" | "pixel")
    }
}

/// Encodable metadata handed to the image writer.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataBlock {
    /// ImageJ description block (`ImageJ=…\nunit=…\n`).
    pub description: String,
    /// Pixels per unit along x.
    pub x_resolution: f64,
    /// Pixels per unit along y.
    pub y_resolution: f64,
    /// Editor/provenance string.
    pub software: String,
    /// Pixels per metre, when the unit is a metric length that fits PNG's
    /// `pHYs` chunk.
    pub pixels_per_meter: Option<(u32, u32)>,
}

/// Read and write physical pixel scaling.
pub trait ScalingService {
    /// Detect the scaling of `filename` inside `directory`. `None` when the
    /// file carries no usable scale.
    fn detect(&self, filename: &str, directory: &Path) -> Option<ScalingDescriptor>;

    /// Build the metadata block that embeds `descriptor` on save.
    fn encode(&self, descriptor: &ScalingDescriptor) -> MetadataBlock;
}

/// ImageJ-compatible scaling, also understanding FEI SEM TIFF metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageJScaling;

impl ImageJScaling {
    pub fn new() -> Self {
        Self
    }
}

impl ScalingService for ImageJScaling {
    fn detect(&self, filename: &str, directory: &Path) -> Option<ScalingDescriptor> {
        let path = directory.join(filename);
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let descriptor = match ext.as_str() {
            "tif" | "tiff" => detect_tiff(&path),
            "png" => detect_png(&path),
            _ => None,
        }?;

        (!descriptor.is_unscaled()).then_some(descriptor)
    }

    fn encode(&self, descriptor: &ScalingDescriptor) -> MetadataBlock {
        let x_resolution = resolution(descriptor.x);
        let y_resolution = resolution(descriptor.y);
        let pixels_per_meter = unit_in_meters(&descriptor.unit).and_then(|meters| {
            Some((
                pixels_per_meter(descriptor.x, meters)?,
                pixels_per_meter(descriptor.y, meters)?,
            ))
        });

        MetadataBlock {
            description: format!(
                "ImageJ={IMAGEJ_VERSION}\nunit={}\n",
                escape_unit(&descriptor.unit)
            ),
            x_resolution,
            y_resolution,
            software: escape_non_ascii(&descriptor.editor),
            pixels_per_meter,
        }
    }
}

fn resolution(scale: f64) -> f64 {
    if scale > 0.0 && scale.is_finite() {
        1.0 / scale
    } else {
        1.0
    }
}

fn pixels_per_meter(scale: f64, unit_meters: f64) -> Option<u32> {
    let ppm = (1.0 / (scale * unit_meters)).round();
    (ppm.is_finite() && ppm >= 1.0 && ppm <= u32::MAX as f64).then_some(ppm as u32)
}

/// Length of one `unit` in metres, for metric length units.
pub fn unit_in_meters(unit: &str) -> Option<f64> {
    match unit {
        "m" => Some(1.0),
        "cm" => Some(1e-2),
        "mm" => Some(1e-3),
        "µm" | "μm" | "um" | "micron" => Some(1e-6),
        "nm" => Some(1e-9),
        "pm" => Some(1e-12),
        _ => None,
    }
}

/// The Greek mu is written as the micro sign, which ImageJ expects.
fn escape_unit(unit: &str) -> String {
    escape_non_ascii(&unit.replace('\u{03BC}', "\u{00B5}"))
}

fn unescape_unit(unit: &str) -> String {
    let unit = unescape_non_ascii(unit.trim());
    match unit.as_str() {
        "micron" | "microns" => "µm".to_string(),
        _ => unit,
    }
}

/// Replace every non-ASCII character with `\uXXXX` escapes (UTF-16 code
/// units, as ImageJ writes them). TIFF ASCII tags only hold 7-bit text.
pub fn escape_non_ascii(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            escaped.push(c);
            continue;
        }
        let mut buf = [0u16; 2];
        for unit in c.encode_utf16(&mut buf) {
            escaped.push_str(&format!("\\u{:04X}", unit));
        }
    }
    escaped
}

/// Inverse of [`escape_non_ascii`]. Escaped surrogate pairs are joined;
/// malformed escapes are kept as written.
pub fn unescape_non_ascii(text: &str) -> String {
    let mut units: Vec<u16> = Vec::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        let escaped = rest
            .strip_prefix("\\u")
            .and_then(|r| r.get(..4))
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u16::from_str_radix(hex, 16).ok());
        if let Some(unit) = escaped {
            units.push(unit);
            rest = &rest[6..];
            continue;
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            let mut buf = [0u16; 2];
            units.extend_from_slice(c.encode_utf16(&mut buf));
        }
        rest = chars.as_str();
    }
    String::from_utf16_lossy(&units)
}

/// Extract the unit from an ImageJ description block.
///
/// Returns `None` unless the text starts with `ImageJ=` and carries a
/// `unit=` line.
pub fn parse_imagej_unit(description: &str) -> Option<String> {
    if !description.starts_with("ImageJ=") {
        return None;
    }
    description
        .lines()
        .find_map(|line| line.strip_prefix("unit="))
        .map(unescape_unit)
        .filter(|unit| !unit.is_empty())
}

/// Extract `(PixelWidth, PixelHeight)` in metres from FEI INI metadata.
///
/// Only the `[Scan]` section is consulted; a missing height mirrors the width.
pub fn parse_fei_pixel_size(metadata: &str) -> Option<(f64, f64)> {
    let mut in_scan = false;
    let mut width = None;
    let mut height = None;

    for line in metadata.lines().map(str::trim) {
        if line.starts_with('[') {
            in_scan = line == "[Scan]";
            continue;
        }
        if !in_scan {
            continue;
        }
        if let Some(value) = line.strip_prefix("PixelWidth=") {
            width = value.trim().parse::<f64>().ok();
        } else if let Some(value) = line.strip_prefix("PixelHeight=") {
            height = value.trim().parse::<f64>().ok();
        }
    }

    let width = width.filter(|w| *w > 0.0)?;
    Some((width, height.filter(|h| *h > 0.0).unwrap_or(width)))
}

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

fn detect_tiff(path: &Path) -> Option<ScalingDescriptor> {
    let file = File::open(path).ok()?;
    let mut decoder = TiffDecoder::new(BufReader::new(file)).ok()?;
    imagej_from_tiff(&mut decoder).or_else(|| fei_from_tiff(&mut decoder))
}

fn imagej_from_tiff<R: std::io::Read + std::io::Seek>(
    decoder: &mut TiffDecoder<R>,
) -> Option<ScalingDescriptor> {
    let description = decoder.get_tag_ascii_string(Tag::ImageDescription).ok()?;
    let unit = parse_imagej_unit(&description)?;
    let x_res = rational_tag(decoder, Tag::XResolution)?;
    let y_res = rational_tag(decoder, Tag::YResolution).unwrap_or(x_res);
    let editor = decoder
        .get_tag_ascii_string(Tag::Software)
        .ok()
        .map(|s| unescape_non_ascii(s.trim_end_matches('\0').trim()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "ImageJ".to_string());

    Some(ScalingDescriptor {
        x: 1.0 / x_res,
        y: 1.0 / y_res,
        unit,
        editor,
    })
}

fn fei_from_tiff<R: std::io::Read + std::io::Seek>(
    decoder: &mut TiffDecoder<R>,
) -> Option<ScalingDescriptor> {
    FEI_TAGS.iter().find_map(|&tag| {
        let metadata = decoder.get_tag_ascii_string(Tag::Unknown(tag)).ok()?;
        let (width, height) = parse_fei_pixel_size(&metadata)?;
        Some(ScalingDescriptor {
            x: width * 1e9,
            y: height * 1e9,
            unit: "nm".to_string(),
            editor: "FEI".to_string(),
        })
    })
}

fn rational_tag<R: std::io::Read + std::io::Seek>(
    decoder: &mut TiffDecoder<R>,
    tag: Tag,
) -> Option<f64> {
    let value = match decoder.find_tag(tag).ok().flatten()? {
        Value::Rational(n, d) if d != 0 => n as f64 / d as f64,
        Value::Float(f) => f as f64,
        Value::Double(f) => f,
        _ => return None,
    };
    (value > 0.0).then_some(value)
}

/// Approximate `value` as a TIFF rational, keeping six decimal places where
/// the numerator allows it.
pub fn to_rational(value: f64) -> (u32, u32) {
    if !value.is_finite() || value <= 0.0 {
        return (1, 1);
    }
    let mut denominator: u32 = 1_000_000;
    while denominator > 1 && value * denominator as f64 > u32::MAX as f64 {
        denominator /= 10;
    }
    let numerator = (value * denominator as f64).round().min(u32::MAX as f64).max(1.0) as u32;
    let divisor = gcd(numerator, denominator);
    (numerator / divisor, denominator / divisor)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

fn detect_png(path: &Path) -> Option<ScalingDescriptor> {
    let file = File::open(path).ok()?;
    let reader = png::Decoder::new(BufReader::new(file)).read_info().ok()?;
    let info = reader.info();

    let text = |keyword: &str| {
        info.uncompressed_latin1_text
            .iter()
            .find(|chunk| chunk.keyword == keyword)
            .map(|chunk| chunk.text.clone())
    };

    let unit = parse_imagej_unit(&text("Description")?)?;
    let meters = unit_in_meters(&unit)?;
    let dims = info.pixel_dims?;
    if !matches!(dims.unit, png::Unit::Meter) || dims.xppu == 0 || dims.yppu == 0 {
        return None;
    }

    Some(ScalingDescriptor {
        x: 1.0 / (dims.xppu as f64 * meters),
        y: 1.0 / (dims.yppu as f64 * meters),
        unit,
        editor: text("Software")
            .map(|s| unescape_non_ascii(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "ImageJ".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nm(x: f64, y: f64) -> ScalingDescriptor {
        ScalingDescriptor {
            x,
            y,
            unit: "nm".to_string(),
            editor: "FEI-MAPS".to_string(),
        }
    }

    #[test]
    fn thumbnail_descriptor_divides_by_shrink() {
        let thumb = nm(2.0, 2.0).for_thumbnail(0.5);
        assert_eq!(thumb, nm(4.0, 4.0));
    }

    #[test]
    fn unscaled_descriptor_detection() {
        let mut d = nm(1.0, 1.0);
        assert!(!d.is_unscaled());
        d.unit = "px".to_string();
        assert!(d.is_unscaled());
    }

    #[test]
    fn encode_writes_imagej_block() {
        let block = ImageJScaling.encode(&nm(2.0, 4.0));
        assert_eq!(block.description, "ImageJ=1.11a\nunit=nm\n");
        assert_eq!(block.x_resolution, 0.5);
        assert_eq!(block.y_resolution, 0.25);
        assert_eq!(block.software, "FEI-MAPS");
        assert_eq!(block.pixels_per_meter, Some((500_000_000, 250_000_000)));
    }

    #[test]
    fn encode_escapes_micro_sign() {
        let mut d = nm(0.5, 0.5);
        d.unit = "µm".to_string();
        let block = ImageJScaling.encode(&d);
        assert_eq!(block.description, "ImageJ=1.11a\nunit=\\u00B5m\n");
        assert_eq!(block.pixels_per_meter, Some((2_000_000, 2_000_000)));
    }

    #[test]
    fn encode_keeps_metadata_text_ascii() {
        let mut d = nm(0.1, 0.1);
        d.unit = "Å".to_string();
        d.editor = "Zeiss µ".to_string();
        let block = ImageJScaling.encode(&d);
        assert_eq!(block.description, "ImageJ=1.11a\nunit=\\u00C5\n");
        assert_eq!(block.software, "Zeiss \\u00B5");
        assert!(block.description.is_ascii() && block.software.is_ascii());
    }

    #[test]
    fn greek_mu_written_as_micro_sign() {
        let mut d = nm(1.0, 1.0);
        d.unit = "\u{03BC}m".to_string();
        assert_eq!(
            ImageJScaling.encode(&d).description,
            "ImageJ=1.11a\nunit=\\u00B5m\n"
        );
    }

    #[test]
    fn non_ascii_escapes_survive_unescaping() {
        for text in ["Å", "Zeiss µ", "显微镜", "𝜇m", "plain"] {
            assert_eq!(unescape_non_ascii(&escape_non_ascii(text)), text);
        }
        assert_eq!(escape_non_ascii("𝜇"), "\\uD835\\uDF07");
        assert_eq!(unescape_non_ascii("\\u00zz"), "\\u00zz");
        assert_eq!(unescape_non_ascii("a\\u"), "a\\u");
    }

    #[test]
    fn encode_non_metric_unit_has_no_phys() {
        let mut d = nm(3.0, 3.0);
        d.unit = "inch".to_string();
        assert_eq!(ImageJScaling.encode(&d).pixels_per_meter, None);
    }

    #[test]
    fn parse_imagej_unit_variants() {
        assert_eq!(
            parse_imagej_unit("ImageJ=1.53t\nunit=nm\n"),
            Some("nm".to_string())
        );
        assert_eq!(
            parse_imagej_unit("ImageJ=1.11a\nunit=\\u00B5m\n"),
            Some("µm".to_string())
        );
        assert_eq!(
            parse_imagej_unit("ImageJ=1.11a\nunit=micron\n"),
            Some("µm".to_string())
        );
        assert_eq!(parse_imagej_unit("ImageJ=1.11a\nimages=1\n"), None);
        assert_eq!(parse_imagej_unit("unit=nm\n"), None);
    }

    #[test]
    fn parse_fei_reads_scan_section_only() {
        let metadata = "[Beam]\nPixelWidth=9\n[Scan]\nPixelWidth=2.5e-09\nPixelHeight=3e-09\n";
        assert_eq!(parse_fei_pixel_size(metadata), Some((2.5e-9, 3e-9)));
    }

    #[test]
    fn parse_fei_height_mirrors_width() {
        assert_eq!(
            parse_fei_pixel_size("[Scan]\nPixelWidth=1e-08\n"),
            Some((1e-8, 1e-8))
        );
        assert_eq!(parse_fei_pixel_size("[Scan]\nDwell=1e-6\n"), None);
    }

    #[test]
    fn rational_approximation() {
        assert_eq!(to_rational(0.5), (1, 2));
        assert_eq!(to_rational(2.0), (2, 1));
        assert_eq!(to_rational(1e9), (1_000_000_000, 1));
        assert_eq!(to_rational(-1.0), (1, 1));
    }

    #[test]
    fn detect_missing_file_is_none() {
        assert_eq!(
            ImageJScaling.detect("nope.tif", Path::new("/nonexistent")),
            None
        );
    }

    #[test]
    fn detect_unknown_extension_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ImageJ=1\nunit=nm\n").unwrap();
        assert_eq!(ImageJScaling.detect("notes.txt", tmp.path()), None);
    }
}
