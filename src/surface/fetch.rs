use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{IoError, SurfaceError};
use crate::pyramid::TileCoordinate;
use crate::tile::{TileCache, TileCacheKey, TileSource};

/// Default number of tile requests in flight per level fetch.
pub const DEFAULT_MAX_CONCURRENT_TILES: usize = 8;

/// Outcome of one tile request within a level fetch.
///
/// Results arrive in completion order; each carries its own coordinate so
/// ordering carries no meaning.
#[derive(Debug)]
pub struct FetchedTile {
    pub coord: TileCoordinate,
    pub result: Result<Bytes, SurfaceError>,
}

/// Fetches tiles of one image through its tile source.
///
/// Cheap to clone; clones share the HTTP client, the cache and the source.
/// Every request is independent and idempotent, so requests may be issued
/// concurrently, repeated, or dropped without affecting one another.
#[derive(Debug, Clone)]
pub struct TileFetcher {
    client: reqwest::Client,
    cache: Arc<TileCache>,
    image_id: Arc<str>,
    source: Arc<dyn TileSource>,
}

impl TileFetcher {
    pub fn new(
        client: reqwest::Client,
        cache: Arc<TileCache>,
        image_id: Arc<str>,
        source: Arc<dyn TileSource>,
    ) -> Self {
        Self {
            client,
            cache,
            image_id,
            source,
        }
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn source(&self) -> &Arc<dyn TileSource> {
        &self.source
    }

    /// Fetch one tile, serving it from the cache when possible.
    pub async fn fetch(&self, coord: TileCoordinate) -> Result<Bytes, SurfaceError> {
        let key = TileCacheKey::new(Arc::clone(&self.image_id), coord);
        if let Some(data) = self.cache.get(&key).await {
            return Ok(data);
        }

        let url = self
            .source
            .tile_url(coord.level, coord.column, coord.row)
            .map_err(|e| SurfaceError::Rejected(e.to_string()))?;

        debug!(image_id = %self.image_id, level = coord.level, column = coord.column, row = coord.row, %url, "Fetching tile");
        let data = get_bytes(&self.client, &url).await?;
        self.cache.put(key, data.clone()).await;
        Ok(data)
    }

    /// Fetch every tile of a level with at most `max_concurrent` requests in
    /// flight.
    ///
    /// Individual failures are reported per tile; only an invalid level fails
    /// the whole call.
    pub async fn fetch_level(
        &self,
        level: u32,
        max_concurrent: usize,
    ) -> Result<Vec<FetchedTile>, SurfaceError> {
        let (columns, rows) = self
            .source
            .tile_grid(level)
            .map_err(|e| SurfaceError::Rejected(e.to_string()))?;

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut tasks = JoinSet::new();
        let mut fetched = Vec::with_capacity((columns as usize) * (rows as usize));

        for row in 0..rows {
            for column in 0..columns {
                // Acquire before spawning so at most `max_concurrent` tasks exist
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let fetcher = self.clone();
                tasks.spawn(async move {
                    let coord = TileCoordinate::new(level, column, row);
                    let result = fetcher.fetch(coord).await;
                    drop(permit);
                    FetchedTile { coord, result }
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(tile) => fetched.push(tile),
                Err(e) => warn!("Tile fetch task failed: {}", e),
            }
        }

        Ok(fetched)
    }
}

/// GET `url` and return the body of a successful response.
pub(crate) async fn get_bytes(client: &reqwest::Client, url: &str) -> Result<Bytes, SurfaceError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| IoError::Connection(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IoError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }
        .into());
    }

    let data = response
        .bytes()
        .await
        .map_err(|e| IoError::Connection(e.to_string()))?;
    Ok(data)
}
