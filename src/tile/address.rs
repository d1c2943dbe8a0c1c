use std::sync::Arc;

use crate::endpoints::Endpoints;
use crate::error::StreamError;
use crate::pyramid::{check_tile, PyramidDescriptor, TileCoordinate};

/// Builds tile retrieval addresses from viewer coordinates.
///
/// The builder validates the coordinate against the descriptor, converts the
/// viewer level to the source level and composes the address. It performs no
/// I/O and holds no mutable state: identical inputs always produce identical
/// addresses, which downstream HTTP caches rely on.
#[derive(Debug, Clone)]
pub struct TileAddressBuilder {
    endpoints: Arc<Endpoints>,
}

impl TileAddressBuilder {
    pub fn new(endpoints: Arc<Endpoints>) -> Self {
        Self { endpoints }
    }

    /// Get the endpoints used to compose addresses.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Address of the tile at `coord` (viewer numbering).
    pub fn build_url(
        &self,
        image_id: &str,
        coord: &TileCoordinate,
        descriptor: &PyramidDescriptor,
    ) -> Result<String, StreamError> {
        let source_level = check_tile(coord, descriptor)?;
        Ok(self.endpoints.tile_url(
            image_id,
            source_level,
            coord.column,
            coord.row,
            descriptor.tile_format().extension(),
        ))
    }

    /// Address of the whole-image overview for `image_id`, if any.
    pub fn overview_url(&self, image_id: &str) -> Option<String> {
        self.endpoints.overview_url(image_id)
    }
}
