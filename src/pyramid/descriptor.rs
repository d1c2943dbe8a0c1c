//! Pyramid descriptor parsing and validation.
//!
//! The descriptor is the structural metadata of a tiled image: full-resolution
//! dimensions, tile size and overlap, number of levels and tile encoding. It is
//! everything needed to address tiles without looking at pixel data.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "width": 46920,
//!   "height": 33600,
//!   "tile_size": 256,
//!   "overlap": 0,
//!   "format": "jpeg",
//!   "levels": 4,
//!   "level_dimensions": [[46920, 33600], [11730, 8400], ...]
//! }
//! ```
//!
//! `width`, `height`, `tile_size` and `levels` are required. `overlap`
//! defaults to 0 and `format` to JPEG.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Maximum number of pyramid levels.
///
/// The coarsest level is downsampled by `2^(level_count - 1)`, which must fit
/// in a `u32` scale factor.
pub const MAX_LEVEL_COUNT: u32 = 32;

// =============================================================================
// Tile Format
// =============================================================================

/// Encoding of the tiles served for a pyramid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl TileFormat {
    /// Parse a format name as found in descriptors (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(TileFormat::Jpeg),
            "png" => Some(TileFormat::Png),
            "webp" => Some(TileFormat::Webp),
            _ => None,
        }
    }

    /// File extension used in tile addresses.
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpg",
            TileFormat::Png => "png",
            TileFormat::Webp => "webp",
        }
    }
}

// =============================================================================
// Raw Descriptor
// =============================================================================

/// Descriptor as received on the wire, before validation.
///
/// Every field is optional so that a missing field is reported as a malformed
/// descriptor instead of a generic JSON error.
#[derive(Debug, Deserialize)]
struct RawDescriptor {
    width: Option<u64>,
    height: Option<u64>,
    #[serde(alias = "tileSize")]
    tile_size: Option<u64>,
    overlap: Option<u64>,
    #[serde(alias = "level_count")]
    levels: Option<u64>,
    format: Option<String>,
    #[serde(default)]
    level_dimensions: Option<Vec<(u64, u64)>>,
}

fn required(value: Option<u64>, field: &'static str) -> Result<u32, StreamError> {
    let value = value.ok_or_else(|| StreamError::malformed(format!("missing field '{field}'")))?;
    u32::try_from(value)
        .map_err(|_| StreamError::malformed(format!("field '{field}' too large: {value}")))
}

// =============================================================================
// Pyramid Descriptor
// =============================================================================

/// Validated structural metadata of one tiled image pyramid.
///
/// Instances can only be created through [`PyramidDescriptor::new`] or
/// [`PyramidDescriptor::from_json`], so every descriptor in circulation
/// satisfies the pyramid invariants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PyramidDescriptor {
    width: u32,
    height: u32,
    tile_size: u32,
    overlap: u32,
    level_count: u32,
    tile_format: TileFormat,
}

impl PyramidDescriptor {
    /// Create a descriptor, validating the invariants.
    pub fn new(
        width: u32,
        height: u32,
        tile_size: u32,
        overlap: u32,
        level_count: u32,
        tile_format: TileFormat,
    ) -> Result<Self, StreamError> {
        if width == 0 || height == 0 {
            return Err(StreamError::malformed(format!(
                "image dimensions must be positive, got {width}x{height}"
            )));
        }
        if tile_size == 0 {
            return Err(StreamError::malformed("tile_size must be positive"));
        }
        if overlap >= tile_size {
            return Err(StreamError::malformed(format!(
                "overlap {overlap} must be smaller than tile_size {tile_size}"
            )));
        }
        if level_count == 0 {
            return Err(StreamError::malformed("levels must be at least 1"));
        }
        if level_count > MAX_LEVEL_COUNT {
            return Err(StreamError::malformed(format!(
                "levels must be at most {MAX_LEVEL_COUNT}, got {level_count}"
            )));
        }

        Ok(Self {
            width,
            height,
            tile_size,
            overlap,
            level_count,
            tile_format,
        })
    }

    /// Parse and validate a JSON descriptor body.
    pub fn from_json(body: &[u8]) -> Result<Self, StreamError> {
        let raw: RawDescriptor = serde_json::from_slice(body)
            .map_err(|e| StreamError::malformed(format!("invalid descriptor JSON: {e}")))?;

        let width = required(raw.width, "width")?;
        let height = required(raw.height, "height")?;
        let tile_size = required(raw.tile_size, "tile_size")?;
        let level_count = required(raw.levels, "levels")?;
        let overlap = required(Some(raw.overlap.unwrap_or(0)), "overlap")?;

        let tile_format = match raw.format.as_deref() {
            None => TileFormat::default(),
            Some(name) => TileFormat::parse(name)
                .ok_or_else(|| StreamError::malformed(format!("unsupported format '{name}'")))?,
        };

        let descriptor = Self::new(width, height, tile_size, overlap, level_count, tile_format)?;

        if let Some(dims) = &raw.level_dimensions {
            if dims.len() as u64 != u64::from(level_count) {
                return Err(StreamError::malformed(format!(
                    "level_dimensions has {} entries but levels is {level_count}",
                    dims.len()
                )));
            }
            if dims[0] != (u64::from(width), u64::from(height)) {
                return Err(StreamError::malformed(format!(
                    "level_dimensions[0] is {:?}, expected ({width}, {height})",
                    dims[0]
                )));
            }
        }

        Ok(descriptor)
    }

    /// Full-resolution width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Full-resolution height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Edge length of a square tile, excluding overlap.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Pixels shared with each neighbouring tile.
    pub fn overlap(&self) -> u32 {
        self.overlap
    }

    /// Number of pyramid levels (at least 1).
    pub fn level_count(&self) -> u32 {
        self.level_count
    }

    /// Encoding of the tiles.
    pub fn tile_format(&self) -> TileFormat {
        self.tile_format
    }
}
