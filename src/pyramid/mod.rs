//! Pyramid description and geometry.
//!
//! - [`PyramidDescriptor`]: validated structural metadata of one image
//! - [`DescriptorLoader`]: fetches descriptors (HTTP via [`HttpDescriptorLoader`])
//! - [`mapping`]: viewer-level/source-level inversion and per-level tile grids

mod descriptor;
mod loader;
pub mod mapping;

pub use descriptor::{PyramidDescriptor, TileFormat, MAX_LEVEL_COUNT};
pub use loader::{DescriptorLoader, HttpDescriptorLoader};
pub use mapping::{
    check_tile, level_dimensions, level_scale, tile_bounds, tile_grid, to_source_level,
    to_viewer_level, TileBounds, TileCoordinate,
};
