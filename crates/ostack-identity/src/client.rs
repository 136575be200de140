//! Keystone v3 client and authenticated sessions.

use chrono::{DateTime, Utc};
use ostack_core::client::{
    default_status_error, versioned_endpoint, ClientConfig, RetryPolicy, ServiceClient,
    ServiceClientBuilder,
};
use ostack_core::config::{AuthConfig, ClientSettings};
use ostack_core::services::ServiceCatalog;
use ostack_core::types::{Interface, ServiceType};
use ostack_core::Error;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use url::Url;

use crate::models::{AuthRequest, NamedRef, TokenEnvelope};
use crate::Result;

/// Response header carrying the issued token.
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

const IDENTITY_API_VERSION: &str = "v3";

/// Builder for [`IdentityClient`].
#[derive(Debug, Clone)]
pub struct IdentityClientBuilder {
    inner: ServiceClientBuilder,
}

impl IdentityClientBuilder {
    /// Create a builder from a Keystone URL, with or without the `/v3` suffix.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(auth_url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(auth_url.as_ref()).map_err(|err| {
            Error::ConfigError(format!(
                "Invalid identity URL `{}`: {err}",
                auth_url.as_ref()
            ))
        })?;
        let base = versioned_endpoint(&url, IDENTITY_API_VERSION)?;
        let inner = ServiceClientBuilder::new(
            ServiceType::Identity,
            base,
            ServiceType::Identity.default_timeout(),
        )?;
        Ok(Self { inner })
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

    /// Build the client instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<IdentityClient> {
        Ok(IdentityClient {
            inner: self.inner.build()?,
        })
    }
}

/// Asynchronous client for the Keystone v3 API.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    inner: ServiceClient,
}

impl IdentityClient {
    /// Construct directly from a Keystone URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(auth_url: impl AsRef<str>) -> Result<Self> {
        IdentityClientBuilder::new(auth_url)?.build()
    }

    /// Access the versioned base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// Authenticate with a password and scope the token to the configured
    /// project.
    ///
    /// The returned session resolves endpoints in the configured region on the
    /// public interface; see [`Session::with_interface`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when no password is configured,
    /// [`Error::AuthenticationFailed`] when Keystone rejects the credentials or
    /// omits the token header, and transport errors otherwise.
    pub async fn authenticate(&self, auth: &AuthConfig) -> Result<Session> {
        let password = auth.password()?;
        let request = AuthRequest::password(
            &auth.username,
            auth.user_domain(),
            password.expose_secret(),
            &auth.project_name,
            auth.project_domain(),
        );

        debug!(user = %auth.username, project = %auth.project_name, "requesting token");

        let response = self
            .inner
            .execute_with_retry(
                Method::POST,
                "auth/tokens",
                &[],
                |builder| {
                    builder
                        .header(ACCEPT, "application/json")
                        .header(CONTENT_TYPE, "application/json")
                        .json(&request)
                },
                identity_status_error,
            )
            .await?;

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| SecretString::from(value.to_string()))
            .ok_or_else(|| {
                Error::AuthenticationFailed(format!(
                    "identity response carried no {SUBJECT_TOKEN_HEADER} header"
                ))
            })?;

        let envelope: TokenEnvelope = response.json().await.map_err(|err| {
            Error::ParseError(format!("Failed to parse identity token response: {err}"))
        })?;
        let body = envelope.token;

        info!(
            user = %body.user.name,
            project = body.project.as_ref().map(|p| p.name.as_str()),
            services = body.catalog.entries().len(),
            "authenticated"
        );

        Ok(Session {
            token,
            expires_at: body.expires_at,
            user: body.user,
            project: body.project,
            catalog: body.catalog,
            region: auth.region_name.clone(),
            interface: Interface::Public,
        })
    }
}

fn identity_status_error(service: ServiceType, status: StatusCode, message: String) -> Error {
    match status {
        StatusCode::UNAUTHORIZED => {
            Error::AuthenticationFailed(format!("invalid credentials: {message}"))
        }
        _ => default_status_error(service, status, message),
    }
}

/// An authenticated, project-scoped Keystone session.
///
/// The token is never printed by `Debug`.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
    user: NamedRef,
    project: Option<NamedRef>,
    catalog: ServiceCatalog,
    region: Option<String>,
    interface: Interface,
}

impl Session {
    /// Assemble a session from its parts.
    #[must_use]
    pub fn new(token: SecretString, user: NamedRef, catalog: ServiceCatalog) -> Self {
        Self {
            token,
            expires_at: None,
            user,
            project: None,
            catalog,
            region: None,
            interface: Interface::Public,
        }
    }

    /// Restrict endpoint resolution to `region`.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Resolve endpoints on `interface` instead of the public one.
    #[must_use]
    pub const fn with_interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    /// The token.
    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }

    /// Token expiry, when Keystone reported one.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    /// The authenticated user.
    #[must_use]
    pub const fn user(&self) -> &NamedRef {
        &self.user
    }

    /// The scoped project.
    #[must_use]
    pub const fn project(&self) -> Option<&NamedRef> {
        self.project.as_ref()
    }

    /// The service catalog.
    #[must_use]
    pub const fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Region used for endpoint resolution.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Resolve the catalog endpoint of `service`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndpointNotFound`] if the catalog lacks the service.
    pub fn endpoint(&self, service: ServiceType) -> Result<Url> {
        self.catalog
            .endpoint(service, self.interface, self.region.as_deref())
    }

    /// Build an authenticated [`ServiceClient`] for `service`.
    ///
    /// When `version` is set it is appended to the catalog URL unless already
    /// present.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be resolved or the client
    /// cannot be built.
    pub fn service_client(
        &self,
        service: ServiceType,
        version: Option<&str>,
        settings: &ClientSettings,
    ) -> Result<ServiceClient> {
        let mut endpoint = self.endpoint(service)?;
        if let Some(version) = version {
            endpoint = versioned_endpoint(&endpoint, version)?;
        }
        debug!(%service, %endpoint, "resolved endpoint");

        ServiceClientBuilder::new(service, endpoint, settings.timeout_for(service))?
            .with_http_config(settings.client_config(service)?)
            .with_token(self.token.clone())
            .build()
    }
}
