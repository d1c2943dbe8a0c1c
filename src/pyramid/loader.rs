use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::endpoints::Endpoints;
use crate::error::{IoError, StreamError};

use super::descriptor::PyramidDescriptor;

/// Trait for loading the pyramid descriptor of an image.
///
/// This abstraction lets the session controller work against the HTTP
/// backend in production and against in-memory loaders in tests. Each call is
/// independent: implementations must not cache across image identifiers.
#[async_trait]
pub trait DescriptorLoader: Send + Sync {
    /// Fetch and validate the descriptor for `image_id`.
    ///
    /// Fails with [`StreamError::DescriptorUnavailable`] when the transport
    /// fails or the backend answers with a non-success status, and with
    /// [`StreamError::MalformedDescriptor`] when the body fails validation.
    async fn load(&self, image_id: &str) -> Result<PyramidDescriptor, StreamError>;
}

#[async_trait]
impl<L: DescriptorLoader + ?Sized> DescriptorLoader for Arc<L> {
    async fn load(&self, image_id: &str) -> Result<PyramidDescriptor, StreamError> {
        (**self).load(image_id).await
    }
}

/// HTTP implementation of [`DescriptorLoader`].
///
/// Issues one `GET` per call against [`Endpoints::descriptor_url`]. Timeouts
/// and connection reuse are whatever the supplied `reqwest::Client` is
/// configured with.
#[derive(Debug, Clone)]
pub struct HttpDescriptorLoader {
    client: reqwest::Client,
    endpoints: Arc<Endpoints>,
}

impl HttpDescriptorLoader {
    pub fn new(client: reqwest::Client, endpoints: Arc<Endpoints>) -> Self {
        Self { client, endpoints }
    }

    /// Get the endpoints this loader fetches from.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

#[async_trait]
impl DescriptorLoader for HttpDescriptorLoader {
    async fn load(&self, image_id: &str) -> Result<PyramidDescriptor, StreamError> {
        let url = self.endpoints.descriptor_url(image_id);
        debug!(image_id, %url, "Fetching pyramid descriptor");

        let unavailable = |source: IoError| StreamError::DescriptorUnavailable {
            image_id: image_id.to_string(),
            source,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(IoError::Connection(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(IoError::Status {
                status: status.as_u16(),
                url,
            }));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| unavailable(IoError::Connection(e.to_string())))?;

        let descriptor = PyramidDescriptor::from_json(&body)?;
        debug!(
            image_id,
            width = descriptor.width(),
            height = descriptor.height(),
            levels = descriptor.level_count(),
            "Descriptor loaded"
        );
        Ok(descriptor)
    }
}
