//! Level and tile-grid geometry.
//!
//! Two level numbering conventions meet here:
//! - the viewing surface numbers levels coarsest-first (viewer level 0 is the
//!   most zoomed-out representation, `level_count - 1` is full resolution)
//! - the source pyramid numbers levels finest-first (source level 0 is full
//!   resolution)
//!
//! `source = level_count - 1 - viewer`. Every other geometric quantity is
//! derived from the viewer level, since that is what the surface computes from
//! its zoom factor. Each level halves the linear resolution of the next finer
//! one, so at viewer level `v` the image is downsampled by
//! `2^(level_count - 1 - v)`.

use serde::Serialize;

use crate::error::StreamError;

use super::descriptor::PyramidDescriptor;

/// A tile position in the viewer's level numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileCoordinate {
    /// Viewer level (0 = coarsest)
    pub level: u32,

    /// Tile column (0-indexed from left)
    pub column: u32,

    /// Tile row (0-indexed from top)
    pub row: u32,
}

impl TileCoordinate {
    pub fn new(level: u32, column: u32, row: u32) -> Self {
        Self { level, column, row }
    }
}

/// Pixel rectangle covered by a tile within its level, overlap included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Convert a viewer level (0 = coarsest) to a source level (0 = finest).
pub fn to_source_level(viewer_level: u32, level_count: u32) -> Result<u32, StreamError> {
    if viewer_level >= level_count {
        return Err(StreamError::LevelOutOfRange {
            level: viewer_level,
            level_count,
        });
    }
    Ok(level_count - 1 - viewer_level)
}

/// Convert a source level (0 = finest) back to a viewer level.
///
/// The inversion is its own inverse; this is the same formula named for the
/// other direction.
pub fn to_viewer_level(source_level: u32, level_count: u32) -> Result<u32, StreamError> {
    to_source_level(source_level, level_count)
}

/// Downsample factor of a viewer level relative to full resolution.
pub fn level_scale(viewer_level: u32, descriptor: &PyramidDescriptor) -> Result<u32, StreamError> {
    let source_level = to_source_level(viewer_level, descriptor.level_count())?;
    // level_count <= 32 keeps the shift in range
    Ok(1u32 << source_level)
}

/// Dimensions of the image at a viewer level.
///
/// `ceil(width / scale) x ceil(height / scale)` with
/// `scale = 2^(level_count - 1 - viewer_level)`.
pub fn level_dimensions(
    viewer_level: u32,
    descriptor: &PyramidDescriptor,
) -> Result<(u32, u32), StreamError> {
    let scale = level_scale(viewer_level, descriptor)?;
    Ok((
        descriptor.width().div_ceil(scale),
        descriptor.height().div_ceil(scale),
    ))
}

/// Number of tile columns and rows at a viewer level.
pub fn tile_grid(
    viewer_level: u32,
    descriptor: &PyramidDescriptor,
) -> Result<(u32, u32), StreamError> {
    let (level_width, level_height) = level_dimensions(viewer_level, descriptor)?;
    let tile_size = descriptor.tile_size();
    Ok((
        level_width.div_ceil(tile_size),
        level_height.div_ceil(tile_size),
    ))
}

/// Validate a tile coordinate and return its source level.
pub fn check_tile(coord: &TileCoordinate, descriptor: &PyramidDescriptor) -> Result<u32, StreamError> {
    let source_level = to_source_level(coord.level, descriptor.level_count())?;
    let (columns, rows) = tile_grid(coord.level, descriptor)?;

    if coord.column >= columns || coord.row >= rows {
        return Err(StreamError::TileOutOfRange {
            level: coord.level,
            column: coord.column,
            row: coord.row,
            columns,
            rows,
        });
    }

    Ok(source_level)
}

/// Pixel bounds of a tile within its level.
///
/// Interior edges are extended by the descriptor's overlap and the result is
/// clipped to the level, following the Deep Zoom tiling convention.
pub fn tile_bounds(
    coord: &TileCoordinate,
    descriptor: &PyramidDescriptor,
) -> Result<TileBounds, StreamError> {
    check_tile(coord, descriptor)?;
    let (level_width, level_height) = level_dimensions(coord.level, descriptor)?;
    let tile_size = descriptor.tile_size();
    let overlap = descriptor.overlap();

    let span = |index: u32, extent: u32| -> (u32, u32) {
        let start = index * tile_size;
        let lead = if index == 0 { 0 } else { overlap };
        let origin = start - lead;
        let end = start
            .saturating_add(tile_size.saturating_add(overlap))
            .min(extent);
        (origin, end - origin)
    };

    let (x, width) = span(coord.column, level_width);
    let (y, height) = span(coord.row, level_height);

    Ok(TileBounds {
        x,
        y,
        width,
        height,
    })
}
