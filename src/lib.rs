//! # WSI Tilestream
//!
//! A client for streaming tiles of gigapixel Whole Slide Images from an HTTP
//! slide backend into a pannable, zoomable viewing surface.
//!
//! Instead of downloading a full-resolution image, the client loads a small
//! pyramid descriptor, then requests only the tiles the viewer needs at the
//! zoom level being displayed.
//!
//! ## Features
//!
//! - **Descriptor validation**: dimensions, tile size, overlap and level count are checked before any tile is requested
//! - **Level mapping**: viewer level 0 is the coarsest; source level 0 is full resolution
//! - **Session control**: overlapping selections never display stale content
//! - **Overview fallback**: optionally show a single downsampled image when tiles cannot stream
//! - **Tile caching**: size-bounded LRU of fetched tile bytes
//!
//! ## Architecture
//!
//! - [`pyramid`] - Descriptor, loader and viewer/source level mapping
//! - [`endpoints`] - Backend address layout
//! - [`tile`] - Tile addressing, the tile source adapter and the tile cache
//! - [`surface`] - Viewing surface contract and the HTTP surface
//! - [`session`] - Session controller and its state machine
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wsi_tilestream::{
//!     Endpoints, HttpDescriptorLoader, HttpSurface, SelectOutcome, SessionController,
//!     TileAddressBuilder, TileCache,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let endpoints = Arc::new(Endpoints::new("http://localhost:8000").unwrap());
//!     let client = reqwest::Client::new();
//!
//!     let controller = SessionController::new(
//!         HttpDescriptorLoader::new(client.clone(), endpoints.clone()),
//!         HttpSurface::new(client, Arc::new(TileCache::new())),
//!         TileAddressBuilder::new(endpoints),
//!     );
//!
//!     if let SelectOutcome::Streaming(source) = controller.select("slide-42").await {
//!         println!("{:?}", source.info());
//!     }
//! }
//! ```

pub mod config;
pub mod endpoints;
pub mod error;
pub mod pyramid;
pub mod session;
pub mod surface;
pub mod tile;

// Re-export commonly used types
pub use config::{
    Cli, ClientConfig, Command, FallbackPolicy, InfoConfig, OpenConfig, UrlsConfig,
};
pub use endpoints::{Endpoints, DEFAULT_API_PREFIX, DEFAULT_BASE_URL};
pub use error::{ErrorKind, IoError, StreamError, SurfaceError};
pub use pyramid::{
    DescriptorLoader, HttpDescriptorLoader, PyramidDescriptor, TileCoordinate, TileFormat,
    MAX_LEVEL_COUNT,
};
pub use session::{OverviewReason, SelectOutcome, SessionController, SessionId, SessionState};
pub use surface::{
    FetchedTile, HttpSurface, OverviewImage, SurfaceContent, TileFetcher, TiledContent,
    ViewingSurface,
};
pub use tile::{
    PyramidTileSource, TileAddressBuilder, TileCache, TileCacheKey, TileSource, TileSourceInfo,
};
