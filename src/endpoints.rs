//! Backend address scheme.
//!
//! All addresses are derived from a base URL and an API prefix:
//!
//! ```text
//! {base}{prefix}/{image_id}/dzi                                  descriptor
//! {base}{prefix}/{image_id}/tiles/{source_level}/{col}_{row}.{ext}   tile
//! {base}{prefix}/{image_id}/overview                             overview
//! ```
//!
//! Image identifiers are percent-encoded, so identifiers containing `/` or
//! spaces stay in a single path segment.

use url::Url;

use crate::error::IoError;

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default path prefix of the slides API.
pub const DEFAULT_API_PREFIX: &str = "/api/slides";

/// Address builder for descriptor, tile and overview requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base URL without trailing slash
    base: String,

    /// Path prefix with a leading slash and no trailing slash (may be empty)
    prefix: String,

    /// Whether the backend serves whole-image overviews
    overview_enabled: bool,
}

impl Endpoints {
    /// Create endpoints for the given base URL with the default prefix.
    ///
    /// Only `http` and `https` URLs are accepted.
    pub fn new(base_url: &str) -> Result<Self, IoError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| IoError::InvalidAddress(format!("{base_url}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(IoError::InvalidAddress(format!(
                "{base_url}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(IoError::InvalidAddress(format!(
                "{base_url}: base URL must not carry a query or fragment"
            )));
        }

        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
            prefix: normalize_prefix(DEFAULT_API_PREFIX),
            overview_enabled: true,
        })
    }

    /// Replace the API prefix.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = normalize_prefix(prefix);
        self
    }

    /// Enable or disable the overview address.
    pub fn with_overview(mut self, enabled: bool) -> Self {
        self.overview_enabled = enabled;
        self
    }

    /// The base URL (no trailing slash).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The normalized API prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Address of the pyramid descriptor for an image.
    pub fn descriptor_url(&self, image_id: &str) -> String {
        format!("{}/dzi", self.image_root(image_id))
    }

    /// Address of one tile, in source level numbering.
    pub fn tile_url(
        &self,
        image_id: &str,
        source_level: u32,
        column: u32,
        row: u32,
        extension: &str,
    ) -> String {
        format!(
            "{}/tiles/{}/{}_{}.{}",
            self.image_root(image_id),
            source_level,
            column,
            row,
            extension
        )
    }

    /// Address of the whole-image overview, if the backend provides one.
    pub fn overview_url(&self, image_id: &str) -> Option<String> {
        self.overview_enabled
            .then(|| format!("{}/overview", self.image_root(image_id)))
    }

    fn image_root(&self, image_id: &str) -> String {
        format!(
            "{}{}/{}",
            self.base,
            self.prefix,
            urlencoding::encode(image_id)
        )
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
