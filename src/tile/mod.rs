//! Tile addressing and the tile source adapter.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Viewing surface                │
//! │   (asks for level/column/row tiles)     │
//! └────────────────────┬────────────────────┘
//!                      │ TileSource
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          PyramidTileSource              │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  Descriptor  │  │ AddressBuilder  │  │
//! │  │  (geometry)  │  │ (viewer level → │  │
//! │  │              │  │  source level)  │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ GET .../tiles/{source_level}/{col}_{row}.{ext}
//!                      ▼
//!                 Slide backend
//! ```
//!
//! # Components
//!
//! - [`TileAddressBuilder`]: pure `(image, coordinate, descriptor) → address`
//! - [`TileSource`]: capability set a surface consumes
//! - [`PyramidTileSource`]: descriptor-backed implementation
//! - [`TileCache`]: size-bounded LRU of fetched tile bytes

mod address;
mod cache;
mod source;

pub use address::TileAddressBuilder;
pub use cache::{CacheStats, TileCache, TileCacheKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use source::{PyramidTileSource, TileSource, TileSourceInfo};
