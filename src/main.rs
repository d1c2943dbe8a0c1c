//! WSI Tilestream - stream pyramidal slide tiles from an HTTP backend.
//!
//! This binary wires the descriptor loader, the HTTP viewing surface and the
//! session controller together behind a few subcommands.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_tilestream::{
    config::{Cli, ClientConfig, Command, InfoConfig, OpenConfig, UrlsConfig},
    pyramid::{level_scale, to_source_level},
    DescriptorLoader, Endpoints, HttpDescriptorLoader, HttpSurface, PyramidDescriptor,
    PyramidTileSource, SelectOutcome, SessionController, TileAddressBuilder, TileCache,
    TileSource,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Open(config) => run_open(config).await,
        Command::Info(config) => run_info(config).await,
        Command::Urls(config) => run_urls(config).await,
    }
}

// =============================================================================
// Open Command
// =============================================================================

async fn run_open(config: OpenConfig) -> ExitCode {
    init_logging(config.client.verbose);

    let (client, endpoints) = match prepare(&config.client) {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // validate() already checked the size
    let cache_bytes = config.client.tile_cache_bytes().unwrap_or_default();
    let cache = Arc::new(TileCache::with_capacity(cache_bytes));

    info!("Configuration:");
    info!("  Backend: {}{}", endpoints.base(), endpoints.prefix());
    info!("  Fallback: {:?}", config.client.fallback);
    info!(
        "  Cache: {} descriptors, {}MB tiles",
        config.client.descriptor_cache,
        cache_bytes / (1024 * 1024)
    );

    let controller = SessionController::new(
        HttpDescriptorLoader::new(client.clone(), Arc::clone(&endpoints)),
        HttpSurface::new(client, Arc::clone(&cache)),
        TileAddressBuilder::new(endpoints),
    )
    .with_fallback(config.client.fallback)
    .with_descriptor_cache(config.client.descriptor_cache);

    let outcome = if config.overview {
        controller.select_overview(&config.image_id).await
    } else {
        controller.select(&config.image_id).await
    };
    println!("State: {}", controller.state());

    match outcome {
        SelectOutcome::Streaming(source) => {
            print_json(&source.info());

            if let Some(level) = config.prefetch_level {
                return prefetch(&controller, level, config.client.max_concurrent_tiles).await;
            }
            ExitCode::SUCCESS
        }
        SelectOutcome::Overview { url } => {
            let dims = controller
                .inspect_surface(|s| s.overview().map(|o| (o.width, o.height)))
                .await;
            if let Some((width, height)) = dims {
                println!("Overview {}x{} from {}", width, height, url);
            }
            ExitCode::SUCCESS
        }
        SelectOutcome::Degraded { url, error } => {
            warn!("Tile streaming unavailable: {}", error);
            println!("Degraded: displaying overview from {}", url);
            ExitCode::SUCCESS
        }
        SelectOutcome::Failed(e) => {
            error!("Failed to open '{}' ({}): {}", config.image_id, e.kind(), e);
            if e.is_retryable() {
                error!("The backend may be temporarily unavailable; try again.");
            }
            ExitCode::FAILURE
        }
        SelectOutcome::Superseded => ExitCode::SUCCESS,
    }
}

/// Fetch every tile of one viewer level through the attached surface.
async fn prefetch(
    controller: &SessionController<HttpDescriptorLoader, HttpSurface>,
    level: u32,
    max_concurrent: usize,
) -> ExitCode {
    let fetcher = match controller.inspect_surface(|s| s.fetcher()).await {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Cannot prefetch: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tiles = match fetcher.fetch_level(level, max_concurrent).await {
        Ok(tiles) => tiles,
        Err(e) => {
            error!("Cannot prefetch level {}: {}", level, e);
            return ExitCode::FAILURE;
        }
    };

    let mut bytes = 0;
    let mut failed = 0;
    for tile in &tiles {
        match &tile.result {
            Ok(data) => bytes += data.len(),
            Err(e) => {
                failed += 1;
                warn!(
                    column = tile.coord.column,
                    row = tile.coord.row,
                    "Tile failed: {}",
                    e
                );
            }
        }
    }

    println!(
        "Level {}: {} tiles, {} failed, {} bytes",
        level,
        tiles.len(),
        failed,
        bytes
    );

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(config: InfoConfig) -> ExitCode {
    if config.client.verbose {
        init_logging(true);
    }

    let source = match load_source(&config.client, &config.image_id).await {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let descriptor = source.descriptor();

    print_json(&source.info());
    println!();
    println!("Image: {}", config.image_id);
    println!(
        "Size: {}x{}, tile {} (overlap {}), format {}",
        descriptor.width(),
        descriptor.height(),
        descriptor.tile_size(),
        descriptor.overlap(),
        descriptor.tile_format().extension()
    );
    println!();
    println!("viewer  source  scale   dimensions          tiles");
    println!("──────  ──────  ──────  ──────────────────  ──────────");

    for level in source.min_level()..=source.max_level() {
        let row = source_level_row(&source, descriptor, level);
        match row {
            Ok(line) => println!("{}", line),
            Err(e) => {
                println!("✗ level {}: {}", level, e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn source_level_row(
    source: &PyramidTileSource,
    descriptor: &PyramidDescriptor,
    level: u32,
) -> Result<String, wsi_tilestream::StreamError> {
    let source_level = to_source_level(level, descriptor.level_count())?;
    let scale = level_scale(level, descriptor)?;
    let (width, height) = source.level_dimensions(level)?;
    let (columns, rows) = source.tile_grid(level)?;
    Ok(format!(
        "{:>6}  {:>6}  {:>6}  {:>18}  {:>10}",
        level,
        source_level,
        scale,
        format!("{}x{}", width, height),
        format!("{}x{}", columns, rows)
    ))
}

// =============================================================================
// Urls Command
// =============================================================================

async fn run_urls(config: UrlsConfig) -> ExitCode {
    if config.client.verbose {
        init_logging(true);
    }

    let source = match load_source(&config.client, &config.image_id).await {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let (columns, rows) = match source.tile_grid(config.level) {
        Ok(grid) => grid,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for row in 0..rows {
        for column in 0..columns {
            match source.tile_url(config.level, column, row) {
                Ok(url) => println!("{}", url),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate the configuration and build the shared client and endpoints.
fn prepare(config: &ClientConfig) -> Result<(reqwest::Client, Arc<Endpoints>), String> {
    config.validate()?;
    let endpoints = config.endpoints().map_err(|e| e.to_string())?;
    let client = config.http_client().map_err(|e| e.to_string())?;
    Ok((client, Arc::new(endpoints)))
}

/// Load a descriptor and wrap it in a tile source, reporting errors on stderr.
async fn load_source(
    config: &ClientConfig,
    image_id: &str,
) -> Result<PyramidTileSource, ExitCode> {
    let (client, endpoints) = prepare(config).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    })?;

    let loader = HttpDescriptorLoader::new(client, Arc::clone(&endpoints));
    let descriptor = loader.load(image_id).await.map_err(|e| {
        eprintln!("Error ({}): {}", e.kind(), e);
        ExitCode::FAILURE
    })?;

    Ok(PyramidTileSource::new(
        image_id,
        Arc::new(descriptor),
        TileAddressBuilder::new(endpoints),
    ))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Cannot serialize output: {}", e),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_tilestream=debug"
    } else {
        "wsi_tilestream=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
