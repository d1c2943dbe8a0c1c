//! Descriptor loading over HTTP.
//!
//! Tests verify:
//! - Valid descriptors are parsed and validated
//! - Transport failures and non-success statuses are `DescriptorUnavailable`
//! - Bodies failing validation are `MalformedDescriptor`
//! - Identifiers are escaped in the request path

use wsi_tilestream::{
    DescriptorLoader, Endpoints, ErrorKind, HttpDescriptorLoader, IoError, StreamError, TileFormat,
};

use super::test_utils::{MockBackend, SlideFixture};

#[tokio::test]
async fn test_load_valid_descriptor() {
    let backend =
        MockBackend::start(vec![("slide-42", SlideFixture::pyramid(100_000, 80_000, 256, 10))])
            .await;
    let loader = HttpDescriptorLoader::new(reqwest::Client::new(), backend.endpoints());

    let descriptor = loader.load("slide-42").await.unwrap();

    assert_eq!(descriptor.width(), 100_000);
    assert_eq!(descriptor.height(), 80_000);
    assert_eq!(descriptor.tile_size(), 256);
    assert_eq!(descriptor.overlap(), 0);
    assert_eq!(descriptor.level_count(), 10);
    assert_eq!(descriptor.tile_format(), TileFormat::Jpeg);
    assert_eq!(backend.descriptor_requests(), 1);
}

#[tokio::test]
async fn test_load_accepts_alternate_field_names() {
    let backend = MockBackend::start(vec![(
        "dz",
        SlideFixture::raw(
            r#"{"width": 4000, "height": 3000, "tileSize": 254, "overlap": 1, "level_count": 13, "format": "png"}"#,
        ),
    )])
    .await;
    let loader = HttpDescriptorLoader::new(reqwest::Client::new(), backend.endpoints());

    let descriptor = loader.load("dz").await.unwrap();
    assert_eq!(descriptor.tile_size(), 254);
    assert_eq!(descriptor.overlap(), 1);
    assert_eq!(descriptor.level_count(), 13);
    assert_eq!(descriptor.tile_format(), TileFormat::Png);
}

#[tokio::test]
async fn test_unknown_image_is_unavailable() {
    let backend = MockBackend::start(vec![]).await;
    let loader = HttpDescriptorLoader::new(reqwest::Client::new(), backend.endpoints());

    let err = loader.load("missing").await.unwrap_err();
    match &err {
        StreamError::DescriptorUnavailable { image_id, source } => {
            assert_eq!(image_id, "missing");
            assert!(matches!(source, IoError::Status { status: 404, .. }));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_missing_levels_is_malformed() {
    let backend = MockBackend::start(vec![(
        "no-levels",
        SlideFixture::raw(r#"{"width": 1000, "height": 1000, "tile_size": 256}"#),
    )])
    .await;
    let loader = HttpDescriptorLoader::new(reqwest::Client::new(), backend.endpoints());

    let err = loader.load("no-levels").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDescriptor);
    assert!(err.to_string().contains("levels"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_invalid_bodies_are_malformed() {
    let backend = MockBackend::start(vec![
        ("not-json", SlideFixture::raw("<html>oops</html>")),
        (
            "zero-width",
            SlideFixture::raw(r#"{"width": 0, "height": 10, "tile_size": 256, "levels": 1}"#),
        ),
        (
            "big-overlap",
            SlideFixture::raw(
                r#"{"width": 10, "height": 10, "tile_size": 8, "overlap": 8, "levels": 1}"#,
            ),
        ),
        (
            "bad-format",
            SlideFixture::raw(
                r#"{"width": 10, "height": 10, "tile_size": 8, "levels": 1, "format": "tiff"}"#,
            ),
        ),
    ])
    .await;
    let loader = HttpDescriptorLoader::new(reqwest::Client::new(), backend.endpoints());

    for id in ["not-json", "zero-width", "big-overlap", "bad-format"] {
        let err = loader.load(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDescriptor, "image {}", id);
    }
}

#[tokio::test]
async fn test_identifier_is_escaped() {
    let backend = MockBackend::start(vec![(
        "cases/slide 1",
        SlideFixture::pyramid(512, 512, 256, 2),
    )])
    .await;
    let loader = HttpDescriptorLoader::new(reqwest::Client::new(), backend.endpoints());

    let descriptor = loader.load("cases/slide 1").await.unwrap();
    assert_eq!(descriptor.level_count(), 2);
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    // Nothing listens on the discard port
    let endpoints = std::sync::Arc::new(Endpoints::new("http://127.0.0.1:9").unwrap());
    let loader = HttpDescriptorLoader::new(reqwest::Client::new(), endpoints);

    let err = loader.load("slide-42").await.unwrap_err();
    assert!(matches!(
        err,
        StreamError::DescriptorUnavailable {
            source: IoError::Connection(_),
            ..
        }
    ));
}
