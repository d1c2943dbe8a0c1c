//! Viewing surface abstraction.
//!
//! A viewing surface is the pannable/zoomable display that consumes a
//! [`TileSource`] and issues tile requests on its own as the user interacts.
//! The session controller is the only component that opens or closes content
//! on a surface.
//!
//! - [`ViewingSurface`]: open/close contract driven by the controller
//! - [`HttpSurface`]: headless implementation fetching over HTTP
//! - [`TileFetcher`]: concurrent, cache-backed tile retrieval for a source

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SurfaceError;
use crate::tile::TileSource;

mod fetch;
mod http;

pub use fetch::{FetchedTile, TileFetcher, DEFAULT_MAX_CONCURRENT_TILES};
pub use http::{HttpSurface, OverviewImage};

/// Tiled content: a tile source for one image.
#[derive(Debug, Clone)]
pub struct TiledContent {
    pub image_id: Arc<str>,
    pub source: Arc<dyn TileSource>,
}

/// Content the controller asks a surface to display.
#[derive(Debug, Clone)]
pub enum SurfaceContent {
    /// Stream tiles through a tile source
    Tiled(TiledContent),

    /// Display one whole-image overview (legacy single-image mode)
    Overview { image_id: String, url: String },
}

impl SurfaceContent {
    /// The image this content belongs to.
    pub fn image_id(&self) -> &str {
        match self {
            SurfaceContent::Tiled(tiled) => &tiled.image_id,
            SurfaceContent::Overview { image_id, .. } => image_id,
        }
    }
}

/// Contract between the session controller and a viewing surface.
#[async_trait]
pub trait ViewingSurface: Send {
    /// Display `content`, replacing anything currently shown.
    ///
    /// An error means the surface could not initialize the content; the
    /// surface must then be left showing nothing.
    async fn open(&mut self, content: SurfaceContent) -> Result<(), SurfaceError>;

    /// Detach the current content, if any.
    async fn close(&mut self);
}
