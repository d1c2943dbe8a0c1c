//! End-to-end streaming through the session controller.
//!
//! Tests verify:
//! - Selecting an image loads its descriptor and attaches a tile source
//! - Tile requests use source-level numbering
//! - Attach failures end in `Error`, or in a degraded overview with fallback
//! - Prefetching a level is cache-backed and cleared on reselection

use std::sync::Arc;

use wsi_tilestream::{
    ErrorKind, FallbackPolicy, SelectOutcome, StreamError, SurfaceError, TileCache, TileSource,
};

use super::test_utils::{is_valid_jpeg, MockBackend, SlideFixture, TileBehavior};

async fn slide_42_backend() -> MockBackend {
    MockBackend::start(vec![
        ("slide-42", SlideFixture::pyramid(100_000, 80_000, 256, 10)),
        ("small", SlideFixture::pyramid(512, 512, 256, 2)),
        (
            "broken",
            SlideFixture::pyramid(100_000, 80_000, 256, 10).with_tiles(TileBehavior::Fail(500)),
        ),
        (
            "broken-no-overview",
            SlideFixture::pyramid(100_000, 80_000, 256, 10)
                .with_tiles(TileBehavior::Fail(500))
                .with_overview(None),
        ),
        (
            "oversized",
            SlideFixture::pyramid(2048, 2048, 256, 4).with_tiles(TileBehavior::Oversized),
        ),
        (
            "garbage",
            SlideFixture::pyramid(2048, 2048, 256, 4).with_tiles(TileBehavior::Garbage),
        ),
        (
            "no-levels",
            SlideFixture::raw(r#"{"width": 1000, "height": 1000, "tile_size": 256}"#),
        ),
    ])
    .await
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_select_streams_from_coarsest_tile() {
    let backend = slide_42_backend().await;
    let controller = backend.controller(Arc::new(TileCache::new()));

    let source = match controller.select("slide-42").await {
        SelectOutcome::Streaming(source) => source,
        other => panic!("unexpected outcome: {:?}", other),
    };

    assert_eq!(controller.state().name(), "Streaming");
    assert_eq!(backend.descriptor_requests(), 1);

    // The surface checks viewer level 0 first, which is source level 9
    assert_eq!(
        backend.tile_paths().await,
        vec!["/api/slides/slide-42/tiles/9/0_0.jpg"]
    );

    // Full resolution is served by source level 0
    let url = source.tile_url(9, 0, 0).unwrap();
    assert_eq!(
        url,
        format!("{}/api/slides/slide-42/tiles/0/0_0.jpg", backend.base_url())
    );

    let info = source.info();
    assert_eq!(info.min_level, 0);
    assert_eq!(info.max_level, 9);
    assert_eq!(info.format, "jpg");
}

#[tokio::test]
async fn test_prefetch_level_uses_cache() {
    let backend = slide_42_backend().await;
    let cache = Arc::new(TileCache::new());
    let controller = backend.controller(Arc::clone(&cache));

    controller.select("slide-42").await;
    let fetcher = controller
        .inspect_surface(|s| s.fetcher())
        .await
        .expect("tile source attached");

    // Viewer level 2 is source level 7: 782x625 pixels, 4x3 tiles
    assert_eq!(fetcher.source().tile_grid(2).unwrap(), (4, 3));

    let tiles = fetcher.fetch_level(2, 4).await.unwrap();
    assert_eq!(tiles.len(), 12);
    for tile in &tiles {
        let data = tile.result.as_ref().unwrap();
        assert!(is_valid_jpeg(data));
        assert_eq!(tile.coord.level, 2);
    }
    assert_eq!(backend.tile_requests(), 1 + 12);
    assert!(backend
        .tile_paths()
        .await
        .iter()
        .skip(1)
        .all(|path| path.starts_with("/api/slides/slide-42/tiles/7/")));

    // A second pass is served from the cache
    let again = fetcher.fetch_level(2, 4).await.unwrap();
    assert_eq!(again.len(), 12);
    assert_eq!(backend.tile_requests(), 1 + 12);
    assert!(cache.stats().hits >= 12);
}

#[tokio::test]
async fn test_fetch_level_out_of_range() {
    let backend = slide_42_backend().await;
    let controller = backend.controller(Arc::new(TileCache::new()));

    controller.select("small").await;
    let fetcher = controller.inspect_surface(|s| s.fetcher()).await.unwrap();

    assert!(fetcher.fetch_level(2, 4).await.is_err());
    assert_eq!(fetcher.fetch_level(1, 4).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_reselection_detaches_and_clears_cache() {
    let backend = slide_42_backend().await;
    let cache = Arc::new(TileCache::new());
    let controller = backend.controller(Arc::clone(&cache));

    controller.select("slide-42").await;
    let fetcher = controller.inspect_surface(|s| s.fetcher()).await.unwrap();
    fetcher.fetch_level(2, 4).await.unwrap();
    assert_eq!(cache.len().await, 13);

    let outcome = controller.select("small").await;
    assert!(matches!(outcome, SelectOutcome::Streaming(_)));

    // Only the first tile of the new image remains
    assert_eq!(cache.len().await, 1);
    let attached = controller.inspect_surface(|s| s.fetcher()).await.unwrap();
    assert_eq!(attached.image_id(), "small");
    assert_eq!(controller.state().image_id(), Some("small"));
}

#[tokio::test]
async fn test_descriptor_cache_avoids_reloading() {
    let backend = slide_42_backend().await;
    let controller = backend
        .controller(Arc::new(TileCache::new()))
        .with_descriptor_cache(8);

    controller.select("slide-42").await;
    controller.select("small").await;
    controller.select("slide-42").await;

    assert_eq!(backend.descriptor_requests(), 2);
    assert_eq!(controller.state().image_id(), Some("slide-42"));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_malformed_descriptor_requests_no_tiles() {
    let backend = slide_42_backend().await;
    let controller = backend.controller(Arc::new(TileCache::new()));

    let outcome = controller.select("no-levels").await;
    assert!(matches!(outcome, SelectOutcome::Failed(StreamError::MalformedDescriptor { .. })));
    assert_eq!(
        controller.state().error_kind(),
        Some(ErrorKind::MalformedDescriptor)
    );
    assert_eq!(backend.tile_requests(), 0);
}

#[tokio::test]
async fn test_unknown_image_then_recover() {
    let backend = slide_42_backend().await;
    let controller = backend.controller(Arc::new(TileCache::new()));

    controller.select("missing").await;
    assert_eq!(
        controller.state().error_kind(),
        Some(ErrorKind::DescriptorUnavailable)
    );

    controller.select("small").await;
    assert_eq!(controller.state().name(), "Streaming");
}

#[tokio::test]
async fn test_broken_tiles_without_fallback() {
    let backend = slide_42_backend().await;
    let controller = backend.controller(Arc::new(TileCache::new()));

    let outcome = controller.select("broken").await;
    assert!(matches!(
        outcome,
        SelectOutcome::Failed(StreamError::AttachFailed(SurfaceError::Io(_)))
    ));
    assert_eq!(
        controller.state().error_kind(),
        Some(ErrorKind::AttachFailed)
    );
    assert_eq!(backend.overview_requests(), 0);
    assert!(!controller.inspect_surface(|s| s.is_open()).await);
}

#[tokio::test]
async fn test_broken_tiles_fall_back_to_overview() {
    let backend = slide_42_backend().await;
    let controller = backend
        .controller(Arc::new(TileCache::new()))
        .with_fallback(FallbackPolicy::Overview);

    let outcome = controller.select("broken").await;
    match &outcome {
        SelectOutcome::Degraded { url, error } => {
            assert!(url.ends_with("/api/slides/broken/overview"));
            assert_eq!(error.kind(), ErrorKind::AttachFailed);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let state = controller.state();
    assert_eq!(state.name(), "Overview");
    assert!(state.is_degraded());
    assert!(controller.active_source().is_none());

    let dims = controller
        .inspect_surface(|s| s.overview().map(|o| (o.width, o.height)))
        .await;
    assert_eq!(dims, Some((640, 512)));
}

#[tokio::test]
async fn test_fallback_without_overview_ends_in_error() {
    let backend = slide_42_backend().await;
    let controller = backend
        .controller(Arc::new(TileCache::new()))
        .with_fallback(FallbackPolicy::Overview);

    controller.select("broken-no-overview").await;
    assert_eq!(
        controller.state().error_kind(),
        Some(ErrorKind::AttachFailed)
    );
    assert_eq!(backend.overview_requests(), 1);
    assert!(!controller.inspect_surface(|s| s.is_open()).await);
}

#[tokio::test]
async fn test_oversized_tile_is_rejected() {
    let backend = slide_42_backend().await;
    let controller = backend.controller(Arc::new(TileCache::new()));

    let outcome = controller.select("oversized").await;
    assert!(matches!(
        outcome,
        SelectOutcome::Failed(StreamError::AttachFailed(SurfaceError::Rejected(_)))
    ));
}

#[tokio::test]
async fn test_undecodable_tile_is_rejected() {
    let backend = slide_42_backend().await;
    let controller = backend.controller(Arc::new(TileCache::new()));

    let outcome = controller.select("garbage").await;
    assert!(matches!(
        outcome,
        SelectOutcome::Failed(StreamError::AttachFailed(SurfaceError::Decode { .. }))
    ));
}

// =============================================================================
// Overview Mode
// =============================================================================

#[tokio::test]
async fn test_select_overview() {
    let backend = slide_42_backend().await;
    let controller = backend.controller(Arc::new(TileCache::new()));

    let outcome = controller.select_overview("slide-42").await;
    assert!(matches!(outcome, SelectOutcome::Overview { .. }));

    let state = controller.state();
    assert_eq!(state.name(), "Overview");
    assert!(!state.is_degraded());
    assert_eq!(backend.tile_requests(), 0);
    assert_eq!(backend.overview_requests(), 1);

    // Switching back to tiles replaces the overview
    controller.select("slide-42").await;
    assert_eq!(controller.state().name(), "Streaming");
    assert!(controller.inspect_surface(|s| s.overview().is_none()).await);
}

#[tokio::test]
async fn test_clear_detaches_surface() {
    let backend = slide_42_backend().await;
    let cache = Arc::new(TileCache::new());
    let controller = backend.controller(Arc::clone(&cache));

    controller.select("slide-42").await;
    controller.clear().await;

    assert_eq!(controller.state().name(), "Idle");
    assert!(!controller.inspect_surface(|s| s.is_open()).await);
    assert!(cache.is_empty().await);
}
