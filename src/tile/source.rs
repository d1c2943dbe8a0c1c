//! Tile source adapter consumed by viewing surfaces.
//!
//! A pan/zoom surface needs a small capability set to drive tile streaming on
//! its own: image dimensions, tile size and overlap, the range of levels it may
//! request, and a way to turn `(level, column, row)` into an address. The
//! [`TileSource`] trait captures that set; [`PyramidTileSource`] implements it
//! over a validated descriptor.
//!
//! Levels on this interface are always viewer levels (0 = coarsest).

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::StreamError;
use crate::pyramid::{self, PyramidDescriptor, TileCoordinate};

use super::address::TileAddressBuilder;

/// Capability set a viewing surface requires from a tiled image.
///
/// Implementations must be immutable and safe to call from many concurrent
/// tile requests.
pub trait TileSource: Send + Sync + fmt::Debug {
    /// Full-resolution width in pixels.
    fn width(&self) -> u32;

    /// Full-resolution height in pixels.
    fn height(&self) -> u32;

    /// Tile edge length, excluding overlap.
    fn tile_size(&self) -> u32;

    /// Pixels shared between neighbouring tiles.
    fn tile_overlap(&self) -> u32;

    /// Coarsest level the surface may request.
    fn min_level(&self) -> u32;

    /// Finest (full-resolution) level the surface may request.
    fn max_level(&self) -> u32;

    /// Address of a tile.
    fn tile_url(&self, level: u32, column: u32, row: u32) -> Result<String, StreamError>;

    /// Number of levels exposed.
    fn level_count(&self) -> u32 {
        self.max_level() - self.min_level() + 1
    }

    /// Image dimensions at a level, using the surface's halving convention.
    fn level_dimensions(&self, level: u32) -> Result<(u32, u32), StreamError> {
        if level < self.min_level() || level > self.max_level() {
            return Err(StreamError::LevelOutOfRange {
                level,
                level_count: self.level_count(),
            });
        }
        let scale = 1u32 << (self.max_level() - level);
        Ok((self.width().div_ceil(scale), self.height().div_ceil(scale)))
    }

    /// Tile columns and rows at a level.
    fn tile_grid(&self, level: u32) -> Result<(u32, u32), StreamError> {
        let (width, height) = self.level_dimensions(level)?;
        Ok((
            width.div_ceil(self.tile_size()),
            height.div_ceil(self.tile_size()),
        ))
    }
}

/// Serializable summary of a tile source.
///
/// Field names follow the camelCase options of web pan/zoom viewers' custom
/// tile sources, so the JSON can be handed to such a viewer as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSourceInfo {
    pub image_id: String,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub tile_overlap: u32,
    pub min_level: u32,
    pub max_level: u32,
    pub format: String,
}

/// [`TileSource`] backed by a pyramid descriptor.
///
/// Holds only immutable data: the image identifier, a shared descriptor and
/// the address builder. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct PyramidTileSource {
    image_id: Arc<str>,
    descriptor: Arc<PyramidDescriptor>,
    builder: TileAddressBuilder,
}

impl PyramidTileSource {
    pub fn new(
        image_id: impl Into<Arc<str>>,
        descriptor: Arc<PyramidDescriptor>,
        builder: TileAddressBuilder,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            descriptor,
            builder,
        }
    }

    /// The image this source streams.
    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    /// The descriptor backing this source.
    pub fn descriptor(&self) -> &Arc<PyramidDescriptor> {
        &self.descriptor
    }

    /// Address of the tile at `coord`.
    pub fn url_for(&self, coord: &TileCoordinate) -> Result<String, StreamError> {
        self.builder.build_url(&self.image_id, coord, &self.descriptor)
    }

    /// Source-pyramid level that serves a viewer level.
    pub fn source_level(&self, level: u32) -> Result<u32, StreamError> {
        pyramid::to_source_level(level, self.descriptor.level_count())
    }

    /// Capability summary for handing to a viewer.
    pub fn info(&self) -> TileSourceInfo {
        TileSourceInfo {
            image_id: self.image_id.to_string(),
            width: self.width(),
            height: self.height(),
            tile_size: self.tile_size(),
            tile_overlap: self.tile_overlap(),
            min_level: self.min_level(),
            max_level: self.max_level(),
            format: self.descriptor.tile_format().extension().to_string(),
        }
    }
}

impl TileSource for PyramidTileSource {
    fn width(&self) -> u32 {
        self.descriptor.width()
    }

    fn height(&self) -> u32 {
        self.descriptor.height()
    }

    fn tile_size(&self) -> u32 {
        self.descriptor.tile_size()
    }

    fn tile_overlap(&self) -> u32 {
        self.descriptor.overlap()
    }

    fn min_level(&self) -> u32 {
        0
    }

    fn max_level(&self) -> u32 {
        self.descriptor.level_count() - 1
    }

    fn tile_url(&self, level: u32, column: u32, row: u32) -> Result<String, StreamError> {
        self.url_for(&TileCoordinate::new(level, column, row))
    }

    fn level_dimensions(&self, level: u32) -> Result<(u32, u32), StreamError> {
        pyramid::level_dimensions(level, &self.descriptor)
    }

    fn tile_grid(&self, level: u32) -> Result<(u32, u32), StreamError> {
        pyramid::tile_grid(level, &self.descriptor)
    }
}
