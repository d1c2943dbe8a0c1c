//! Configuration management for the tile streaming client.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap, with one subcommand per operation
//! - Environment variables with `TILESTREAM_` prefix
//! - Defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use wsi_tilestream::config::{Cli, Command};
//!
//! let cli = Cli::parse();
//! match cli.into_command() {
//!     Command::Open(config) => println!("Opening {}", config.image_id),
//!     Command::Info(config) => println!("Describing {}", config.image_id),
//!     Command::Urls(config) => println!("Listing level {}", config.level),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `TILESTREAM_BASE_URL` - Backend base address (default: http://localhost:8000)
//! - `TILESTREAM_API_PREFIX` - Route prefix (default: /api/slides)
//! - `TILESTREAM_TIMEOUT` - Request timeout in seconds, 0 disables (default: 30)
//! - `TILESTREAM_FALLBACK` - Behavior when tile streaming fails: `none` or `overview`
//! - `TILESTREAM_NO_OVERVIEW` - The backend has no overview route
//! - `TILESTREAM_DESCRIPTOR_CACHE` - Descriptors to cache, 0 disables (default: 0)
//! - `TILESTREAM_TILE_CACHE` - Tile cache size, e.g. "64MB" (default: 64MB)
//! - `TILESTREAM_MAX_CONCURRENT_TILES` - Tile requests in flight (default: 8)

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::endpoints::{Endpoints, DEFAULT_API_PREFIX, DEFAULT_BASE_URL};
use crate::error::IoError;
use crate::surface::DEFAULT_MAX_CONCURRENT_TILES;

// =============================================================================
// Default Values
// =============================================================================

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default tile cache size.
pub const DEFAULT_TILE_CACHE: &str = "64MB";

/// Default number of cached descriptors (caching disabled).
pub const DEFAULT_DESCRIPTOR_CACHE: usize = 0;

// =============================================================================
// CLI Arguments
// =============================================================================

/// WSI Tilestream - stream pyramidal slide tiles from an HTTP backend.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-tilestream")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Select an image and attach it to a headless viewing surface.
    Open(OpenConfig),

    /// Load and print the pyramid descriptor of an image.
    Info(InfoConfig),

    /// Print every tile address of one viewer level.
    Urls(UrlsConfig),
}

/// What the session controller does when tile streaming cannot be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FallbackPolicy {
    /// Enter the error state
    #[default]
    None,

    /// Display the overview image instead, flagged as degraded
    Overview,
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ClientConfig {
    /// Base address of the slide backend.
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "TILESTREAM_BASE_URL")]
    pub base_url: String,

    /// Route prefix under the base address.
    #[arg(long, default_value = DEFAULT_API_PREFIX, env = "TILESTREAM_API_PREFIX")]
    pub api_prefix: String,

    /// Request timeout in seconds (0 disables the timeout).
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "TILESTREAM_TIMEOUT")]
    pub timeout: u64,

    /// Behavior when the tile source fails to attach.
    #[arg(long, value_enum, default_value_t = FallbackPolicy::None, env = "TILESTREAM_FALLBACK")]
    pub fallback: FallbackPolicy,

    /// The backend exposes no overview route.
    #[arg(long, default_value_t = false, env = "TILESTREAM_NO_OVERVIEW")]
    pub no_overview: bool,

    /// Number of descriptors to cache across selections (0 disables).
    #[arg(long, default_value_t = DEFAULT_DESCRIPTOR_CACHE, env = "TILESTREAM_DESCRIPTOR_CACHE")]
    pub descriptor_cache: usize,

    /// Tile cache size (e.g., "64MB", "512KB", "1GB").
    #[arg(long, default_value = DEFAULT_TILE_CACHE, env = "TILESTREAM_TILE_CACHE")]
    pub tile_cache: String,

    /// Maximum tile requests in flight while prefetching.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_TILES, env = "TILESTREAM_MAX_CONCURRENT_TILES")]
    pub max_concurrent_tiles: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ClientConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        Endpoints::new(&self.base_url).map_err(|e| format!("base_url: {}", e))?;

        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err("api_prefix must be empty or start with '/'".to_string());
        }

        let tile_cache = self.tile_cache_bytes()?;
        if tile_cache == 0 {
            return Err("tile_cache must be greater than 0".to_string());
        }

        if self.max_concurrent_tiles == 0 {
            return Err("max_concurrent_tiles must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Tile cache size in bytes.
    pub fn tile_cache_bytes(&self) -> Result<usize, String> {
        parse_size(&self.tile_cache)
    }

    /// Request timeout, `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    /// Build the backend endpoints from this configuration.
    pub fn endpoints(&self) -> Result<Endpoints, IoError> {
        Ok(Endpoints::new(&self.base_url)?
            .with_prefix(&self.api_prefix)
            .with_overview(!self.no_overview))
    }

    /// Build the HTTP client shared by the loader and the surface.
    pub fn http_client(&self) -> Result<reqwest::Client, IoError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout() {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| IoError::Connection(e.to_string()))
    }
}

#[derive(Args, Debug, Clone)]
pub struct OpenConfig {
    /// Image identifier.
    pub image_id: String,

    /// Display the overview image instead of streaming tiles.
    #[arg(long, default_value_t = false)]
    pub overview: bool,

    /// After attaching, fetch every tile of this viewer level.
    #[arg(long)]
    pub prefetch_level: Option<u32>,

    #[command(flatten)]
    pub client: ClientConfig,
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Image identifier.
    pub image_id: String,

    #[command(flatten)]
    pub client: ClientConfig,
}

#[derive(Args, Debug, Clone)]
pub struct UrlsConfig {
    /// Image identifier.
    pub image_id: String,

    /// Viewer level (0 = coarsest).
    #[arg(short, long)]
    pub level: u32,

    #[command(flatten)]
    pub client: ClientConfig,
}

/// Parse a human-readable size such as "64MB" into bytes.
///
/// Accepts an optional `B`, `KB`, `MB` or `GB` suffix (case-insensitive,
/// powers of 1024). A bare number is a byte count.
pub fn parse_size(value: &str) -> Result<usize, String> {
    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };

    let count: usize = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid size '{}'", value))?;

    count
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{}' is too large", value))
}

// =============================================================================
// Tests
// =============================================================================
