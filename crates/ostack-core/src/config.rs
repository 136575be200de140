//! Authentication and client configuration.
//!
//! This module provides the configuration types needed to authenticate
//! against Keystone and to build the per-service HTTP clients.

use crate::client::{ClientConfig, RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::types::{Interface, ServiceType};
use crate::Error;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Domain used for both the user and the project when nothing else is set.
pub const DEFAULT_DOMAIN: &str = "Default";

/// Keystone v3 password authentication parameters.
///
/// The password is optional in configuration files so it can be supplied
/// from the environment instead; [`AuthConfig::password`] fails if it is
/// still missing when authentication happens.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AuthConfig {
    /// Identity endpoint, e.g. `https://keystone.example:5000/v3`
    #[validate(url)]
    pub auth_url: String,

    /// Region used to pick catalog endpoints
    #[serde(default)]
    #[validate(length(min = 1))]
    pub region_name: Option<String>,

    /// Project to scope the token to
    #[validate(length(min = 1))]
    pub project_name: String,

    /// User name
    #[validate(length(min = 1))]
    pub username: String,

    /// User password
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Domain of both user and project unless overridden below
    #[serde(default = "default_domain")]
    #[validate(length(min = 1))]
    pub domain_name: String,

    /// Domain of the user
    #[serde(default)]
    pub user_domain_name: Option<String>,

    /// Domain of the project
    #[serde(default)]
    pub project_domain_name: Option<String>,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

impl AuthConfig {
    /// Create an authentication configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(
        auth_url: impl Into<String>,
        project_name: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<Self, Error> {
        let config = Self {
            auth_url: auth_url.into(),
            region_name: None,
            project_name: project_name.into(),
            username: username.into(),
            password: None,
            domain_name: default_domain(),
            user_domain_name: None,
            project_domain_name: None,
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid auth configuration: {e}")))?;

        Ok(config)
    }

    /// Set the password.
    #[must_use]
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Set the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region_name = Some(region.into());
        self
    }

    /// Set the domain used for both user and project.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain_name = domain.into();
        self
    }

    /// The password.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no password was supplied.
    pub fn password(&self) -> Result<&SecretString, Error> {
        self.password.as_ref().ok_or_else(|| {
            Error::ConfigError(format!(
                "no password configured for user `{}`",
                self.username
            ))
        })
    }

    /// Domain the user belongs to.
    #[must_use]
    pub fn user_domain(&self) -> &str {
        self.user_domain_name.as_deref().unwrap_or(&self.domain_name)
    }

    /// Domain the project belongs to.
    #[must_use]
    pub fn project_domain(&self) -> &str {
        self.project_domain_name
            .as_deref()
            .unwrap_or(&self.domain_name)
    }

    /// Parse the identity endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_auth_url(&self) -> Result<Url, Error> {
        Url::parse(&self.auth_url)
            .map_err(|e| Error::ConfigError(format!("Invalid auth URL: {e}")))
    }
}

/// Settings shared by every service client.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientSettings {
    /// Catalog interface to use
    #[serde(default)]
    pub interface: Interface,

    /// Request timeout override in seconds; per-service defaults otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: Option<u64>,

    /// Maximum number of retry attempts for idempotent requests
    #[serde(default = "default_max_retries")]
    #[validate(range(max = 10))]
    pub max_retries: u32,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to a custom CA certificate (PEM)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_tls_verify() -> bool {
    true
}

impl ClientSettings {
    /// Settings with all defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            interface: Interface::Public,
            request_timeout_secs: None,
            max_retries: default_max_retries(),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
        }
    }

    /// Effective request timeout for `service`.
    #[must_use]
    pub fn timeout_for(&self, service: ServiceType) -> Duration {
        self.request_timeout_secs
            .map_or_else(|| service.default_timeout(), Duration::from_secs)
    }

    /// Build the HTTP client configuration for `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured CA certificate cannot be read.
    pub fn client_config(&self, service: ServiceType) -> Result<ClientConfig, Error> {
        let mut config = ClientConfig::new()
            .with_timeout(self.timeout_for(service))
            .with_retry_policy(RetryPolicy::new().with_max_retries(self.max_retries))
            .with_tls_verify(self.tls_verify);

        if let Some(path) = &self.tls_ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                Error::ConfigError(format!(
                    "Failed to read CA certificate {}: {e}",
                    path.display()
                ))
            })?;
            config = config.with_root_certificate(pem);
        }

        Ok(config)
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::new()
    }
}
