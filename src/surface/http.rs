use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::error::SurfaceError;
use crate::pyramid::TileCoordinate;
use crate::tile::{TileCache, TileSource};

use super::fetch::{get_bytes, TileFetcher};
use super::{SurfaceContent, ViewingSurface};

/// A decoded whole-image overview.
#[derive(Debug, Clone)]
pub struct OverviewImage {
    pub image_id: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

#[derive(Debug)]
enum OpenContent {
    Tiled(TileFetcher),
    Overview(OverviewImage),
}

/// Headless viewing surface that fetches content over HTTP.
///
/// Opening tiled content fetches and decodes the coarsest tile `(min_level,
/// 0, 0)` to prove the source is servable; opening an overview fetches and
/// decodes the whole image. Fetched tiles go through a shared [`TileCache`]
/// that is cleared whenever content is detached.
#[derive(Debug)]
pub struct HttpSurface {
    client: reqwest::Client,
    cache: Arc<TileCache>,
    content: Option<OpenContent>,
}

impl HttpSurface {
    pub fn new(client: reqwest::Client, cache: Arc<TileCache>) -> Self {
        Self {
            client,
            cache,
            content: None,
        }
    }

    /// Fetcher for the open tiled content.
    ///
    /// Fails with [`SurfaceError::NoContent`] unless a tile source is open.
    pub fn fetcher(&self) -> Result<TileFetcher, SurfaceError> {
        match &self.content {
            Some(OpenContent::Tiled(fetcher)) => Ok(fetcher.clone()),
            _ => Err(SurfaceError::NoContent),
        }
    }

    /// The open overview image, if any.
    pub fn overview(&self) -> Option<&OverviewImage> {
        match &self.content {
            Some(OpenContent::Overview(overview)) => Some(overview),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.content.is_some()
    }

    /// The tile cache shared with fetchers of this surface.
    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }
}

#[async_trait]
impl ViewingSurface for HttpSurface {
    async fn open(&mut self, content: SurfaceContent) -> Result<(), SurfaceError> {
        self.close().await;

        match content {
            SurfaceContent::Tiled(tiled) => {
                let source = Arc::clone(&tiled.source);
                let fetcher = TileFetcher::new(
                    self.client.clone(),
                    Arc::clone(&self.cache),
                    Arc::clone(&tiled.image_id),
                    Arc::clone(&source),
                );

                let first = TileCoordinate::new(source.min_level(), 0, 0);
                let data = fetcher.fetch(first).await?;
                let (width, height) = decode_dimensions(&data, &tiled.image_id)?;

                let limit = max_tile_extent(source.as_ref());
                if width > limit || height > limit {
                    return Err(SurfaceError::Rejected(format!(
                        "coarsest tile is {width}x{height}, larger than {limit}x{limit}"
                    )));
                }

                info!(
                    image_id = %tiled.image_id,
                    levels = source.level_count(),
                    "Tile source opened"
                );
                self.content = Some(OpenContent::Tiled(fetcher));
            }
            SurfaceContent::Overview { image_id, url } => {
                let data = get_bytes(&self.client, &url).await?;
                let (width, height) = decode_dimensions(&data, &url)?;

                info!(image_id = %image_id, width, height, "Overview opened");
                self.content = Some(OpenContent::Overview(OverviewImage {
                    image_id,
                    url,
                    width,
                    height,
                    data,
                }));
            }
        }

        Ok(())
    }

    async fn close(&mut self) {
        if let Some(content) = self.content.take() {
            let image_id = match &content {
                OpenContent::Tiled(fetcher) => fetcher.image_id().to_string(),
                OpenContent::Overview(overview) => overview.image_id.clone(),
            };
            debug!(image_id = %image_id, "Surface content detached");
        }
        self.cache.clear().await;
    }
}

/// Largest edge a served tile may have: the tile size plus overlap on both sides.
fn max_tile_extent(source: &dyn TileSource) -> u32 {
    source
        .tile_size()
        .saturating_add(source.tile_overlap().saturating_mul(2))
}

/// Decode an image fully and return its dimensions.
fn decode_dimensions(data: &[u8], origin: &str) -> Result<(u32, u32), SurfaceError> {
    let image = image::load_from_memory(data).map_err(|e| SurfaceError::Decode {
        url: origin.to_string(),
        message: e.to_string(),
    })?;
    Ok((image.width(), image.height()))
}
