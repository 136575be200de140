//! Asynchronous Glance client implementation.

use futures::Stream;
use ostack_core::client::{ClientConfig, RetryPolicy, ServiceClient, ServiceClientBuilder};
use ostack_core::config::ClientSettings;
use ostack_core::query::{paginate, single_match, PageRequest};
use ostack_core::types::ServiceType;
use ostack_core::uuid::{looks_like_uuid, ImageId};
use ostack_core::Error;
use ostack_identity::Session;
use tracing::debug;
use url::Url;

use crate::models::{Image, ImageListParams, ImagesEnvelope};
use crate::Result;

const USER_AGENT: &str = concat!("ostack-image/", env!("CARGO_PKG_VERSION"));

const IMAGE_API_VERSION: &str = "v2";

/// Builder for [`ImageClient`].
#[derive(Debug, Clone)]
pub struct ImageClientBuilder {
    inner: ServiceClientBuilder,
}

impl ImageClientBuilder {
    /// Create a builder for the specified versioned endpoint, e.g.
    /// `https://glance.example:9292/v2`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let builder = ServiceClientBuilder::new(
            ServiceType::Image,
            base_url,
            ServiceType::Image.default_timeout(),
        )?
        .with_user_agent(USER_AGENT);

        Ok(Self { inner: builder })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.inner = self.inner.with_retry_policy(retry);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.inner = self.inner.with_http_config(config);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ImageClient> {
        let inner = self.inner.build()?;
        Ok(ImageClient { inner })
    }
}

/// Asynchronous Glance client.
#[derive(Debug, Clone)]
pub struct ImageClient {
    inner: ServiceClient,
}

impl ImageClient {
    /// Construct a client directly from the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        ImageClientBuilder::new(base_url)?.build()
    }

    /// Construct a client from the session's image catalog endpoint.
    ///
    /// Glance catalog entries usually omit the API version; `/v2` is appended
    /// when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog has no image endpoint.
    pub fn from_session(session: &Session, settings: &ClientSettings) -> Result<Self> {
        let inner =
            session.service_client(ServiceType::Image, Some(IMAGE_API_VERSION), settings)?;
        Ok(Self { inner })
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// List one page of images.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_images(
        &self,
        params: &ImageListParams,
        page: &PageRequest,
    ) -> Result<Vec<Image>> {
        let envelope: ImagesEnvelope = self
            .inner
            .get_json("images", &params.to_pairs(page))
            .await?;
        Ok(envelope.images)
    }

    /// Stream every image matching `params`, fetching pages lazily.
    pub fn images(&self, params: ImageListParams) -> impl Stream<Item = Result<Image>> + '_ {
        paginate(PageRequest::default(), move |page| {
            let params = params.clone();
            async move { self.list_images(&params, &page).await }
        })
    }

    /// Fetch an image by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the image does not exist.
    pub async fn get_image(&self, id: ImageId) -> Result<Image> {
        let path = format!("images/{id}");
        self.inner.get_json(&path, &[]).await
    }

    /// Find an image by id or exact name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if several images share the name.
    pub async fn find_image(&self, name_or_id: &str) -> Result<Option<Image>> {
        if looks_like_uuid(name_or_id) {
            let id = ImageId::parse_str(name_or_id)?;
            match self.get_image(id).await {
                Ok(image) => return Ok(Some(image)),
                Err(Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let params = ImageListParams {
            name: Some(name_or_id.to_string()),
            ..ImageListParams::default()
        };
        let images = self.list_images(&params, &PageRequest::default()).await?;
        debug!(name = name_or_id, matches = images.len(), "image lookup");
        single_match("image", name_or_id, images)
    }
}
