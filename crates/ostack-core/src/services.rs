//! Service catalog and endpoint resolution.
//!
//! Keystone returns a catalog alongside every scoped token. Service clients
//! are never configured with endpoint URLs directly; they resolve them here
//! by service type, interface and region.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::types::{Interface, ServiceType};

/// One endpoint of a catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEndpoint {
    /// Endpoint id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Interface the endpoint is exposed on
    pub interface: Interface,
    /// Region name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Region id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    /// Endpoint URL
    pub url: String,
}

impl CatalogEndpoint {
    /// Returns true if the endpoint belongs to `region`.
    #[must_use]
    pub fn in_region(&self, region: &str) -> bool {
        self.region_id.as_deref() == Some(region) || self.region.as_deref() == Some(region)
    }
}

/// A service and its endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    /// Service type, e.g. `compute`
    #[serde(rename = "type")]
    pub service_type: String,
    /// Service name, e.g. `nova`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Service id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Advertised endpoints
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// The service catalog of a scoped token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ServiceCatalog {
    entries: Vec<CatalogEntry>,
}

impl ServiceCatalog {
    /// Wrap catalog entries.
    #[must_use]
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// All catalog entries.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Returns true if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the endpoint URL for a service.
    ///
    /// When `region` is `None` the first endpoint with a matching interface
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndpointNotFound`] when no endpoint matches, or
    /// [`Error::InvalidEndpoint`] if the advertised URL cannot be parsed.
    pub fn endpoint(
        &self,
        service: ServiceType,
        interface: Interface,
        region: Option<&str>,
    ) -> Result<Url> {
        let endpoint = self
            .entries
            .iter()
            .filter(|entry| entry.service_type == service.name())
            .flat_map(|entry| entry.endpoints.iter())
            .find(|endpoint| {
                endpoint.interface == interface && region.map_or(true, |r| endpoint.in_region(r))
            })
            .ok_or_else(|| {
                Error::EndpointNotFound(match region {
                    Some(region) => {
                        format!("no {interface} {service} endpoint in region {region}")
                    }
                    None => format!("no {interface} {service} endpoint"),
                })
            })?;

        Url::parse(&endpoint.url).map_err(|err| {
            Error::InvalidEndpoint(format!(
                "catalog {service} endpoint `{}`: {err}",
                endpoint.url
            ))
        })
    }
}
