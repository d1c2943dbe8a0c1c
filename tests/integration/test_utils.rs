//! Test utilities for integration tests.
//!
//! This module provides an in-process mock slide backend built on axum, and
//! helpers for generating tile and overview images.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use wsi_tilestream::{
    Endpoints, HttpDescriptorLoader, HttpSurface, SessionController, TileAddressBuilder,
    TileCache,
};

// =============================================================================
// Image Helpers
// =============================================================================

/// Encode a solid-color JPEG of the given size.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 120, 160]));
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 80);
    encoder.encode_image(&image).unwrap();
    buf
}

/// Check if data starts with the JPEG SOI marker.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

// =============================================================================
// Slide Fixtures
// =============================================================================

/// How the mock backend answers tile requests for a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileBehavior {
    /// Serve a valid JPEG of `tile_size` pixels
    Serve,

    /// Answer with this HTTP status
    Fail(u16),

    /// Serve a valid JPEG larger than the advertised tile size
    Oversized,

    /// Serve bytes that are not an image
    Garbage,
}

/// One slide known to the mock backend.
#[derive(Debug, Clone)]
pub struct SlideFixture {
    descriptor: String,
    tile_size: u32,
    tiles: TileBehavior,
    overview: Option<(u32, u32)>,
}

impl SlideFixture {
    /// A well-formed pyramid with JPEG tiles and no overlap.
    pub fn pyramid(width: u32, height: u32, tile_size: u32, levels: u32) -> Self {
        let descriptor = format!(
            r#"{{"width": {width}, "height": {height}, "tile_size": {tile_size}, "overlap": 0, "levels": {levels}, "format": "jpeg"}}"#
        );
        Self {
            descriptor,
            tile_size,
            tiles: TileBehavior::Serve,
            overview: Some((640, 512)),
        }
    }

    /// A slide whose descriptor body is served verbatim.
    pub fn raw(descriptor: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            tile_size: 256,
            tiles: TileBehavior::Serve,
            overview: None,
        }
    }

    pub fn with_tiles(mut self, tiles: TileBehavior) -> Self {
        self.tiles = tiles;
        self
    }

    pub fn with_overview(mut self, overview: Option<(u32, u32)>) -> Self {
        self.overview = overview;
        self
    }
}

// =============================================================================
// Mock Backend
// =============================================================================

#[derive(Default)]
struct BackendState {
    slides: HashMap<String, SlideFixture>,
    descriptor_requests: AtomicUsize,
    tile_requests: AtomicUsize,
    overview_requests: AtomicUsize,
    tile_paths: RwLock<Vec<String>>,
}

/// A slide backend listening on an ephemeral local port.
///
/// Serves `/api/slides/{id}/dzi`, `/api/slides/{id}/tiles/{level}/{col}_{row}.{ext}`
/// and `/api/slides/{id}/overview`, and counts every request.
pub struct MockBackend {
    base_url: String,
    state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start(slides: Vec<(&str, SlideFixture)>) -> Self {
        let state = Arc::new(BackendState {
            slides: slides
                .into_iter()
                .map(|(id, fixture)| (id.to_string(), fixture))
                .collect(),
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/slides/{id}/dzi", get(descriptor_handler))
            .route("/api/slides/{id}/tiles/{level}/{tile}", get(tile_handler))
            .route("/api/slides/{id}/overview", get(overview_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> Arc<Endpoints> {
        Arc::new(Endpoints::new(&self.base_url).unwrap())
    }

    pub fn descriptor_requests(&self) -> usize {
        self.state.descriptor_requests.load(Ordering::SeqCst)
    }

    pub fn tile_requests(&self) -> usize {
        self.state.tile_requests.load(Ordering::SeqCst)
    }

    pub fn overview_requests(&self) -> usize {
        self.state.overview_requests.load(Ordering::SeqCst)
    }

    /// Paths of every tile request received, in arrival order.
    pub async fn tile_paths(&self) -> Vec<String> {
        self.state.tile_paths.read().await.clone()
    }

    /// A controller wired to this backend through HTTP components.
    pub fn controller(&self, cache: Arc<TileCache>) -> SessionController<HttpDescriptorLoader, HttpSurface> {
        let endpoints = self.endpoints();
        let client = reqwest::Client::new();
        SessionController::new(
            HttpDescriptorLoader::new(client.clone(), Arc::clone(&endpoints)),
            HttpSurface::new(client, cache),
            TileAddressBuilder::new(endpoints),
        )
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn descriptor_handler(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
) -> Response {
    state.descriptor_requests.fetch_add(1, Ordering::SeqCst);
    match state.slides.get(&id) {
        Some(fixture) => (
            [(header::CONTENT_TYPE, "application/json")],
            fixture.descriptor.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "slide not found").into_response(),
    }
}

async fn tile_handler(
    State(state): State<Arc<BackendState>>,
    Path((id, level, tile)): Path<(String, u32, String)>,
) -> Response {
    state.tile_requests.fetch_add(1, Ordering::SeqCst);
    state
        .tile_paths
        .write()
        .await
        .push(format!("/api/slides/{}/tiles/{}/{}", id, level, tile));

    let Some(fixture) = state.slides.get(&id) else {
        return (StatusCode::NOT_FOUND, "slide not found").into_response();
    };

    let parsed = tile
        .split_once('.')
        .and_then(|(coords, _)| coords.split_once('_'))
        .and_then(|(col, row)| Some((col.parse::<u32>().ok()?, row.parse::<u32>().ok()?)));
    if parsed.is_none() {
        return (StatusCode::BAD_REQUEST, "invalid tile name").into_response();
    }

    match fixture.tiles {
        TileBehavior::Serve => jpeg_response(jpeg(fixture.tile_size, fixture.tile_size)),
        TileBehavior::Oversized => {
            jpeg_response(jpeg(fixture.tile_size * 4, fixture.tile_size * 4))
        }
        TileBehavior::Garbage => jpeg_response(b"not really a jpeg".to_vec()),
        TileBehavior::Fail(status) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "tile unavailable").into_response()
        }
    }
}

async fn overview_handler(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
) -> Response {
    state.overview_requests.fetch_add(1, Ordering::SeqCst);
    match state.slides.get(&id).and_then(|fixture| fixture.overview) {
        Some((width, height)) => jpeg_response(jpeg(width, height)),
        None => (StatusCode::NOT_FOUND, "no overview").into_response(),
    }
}

fn jpeg_response(data: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/jpeg")], data).into_response()
}
