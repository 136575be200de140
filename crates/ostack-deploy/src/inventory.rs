//! Read-only listings of cloud resources.
//!
//! Records are streamed page by page from the service clients and written
//! one per line, as text or as JSON.

use crate::cloud::OpenStackCloud;
use crate::error::{DeployError, Result};
use clap::ValueEnum;
use futures::{Stream, TryStreamExt};
use ostack_compute::{Flavor, Server, ServerListParams};
use ostack_image::{Image, ImageListParams};
use ostack_network::{Network, NetworkListParams, Router, RouterListParams};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use tracing::debug;

/// Resource collections that can be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    /// Nova servers
    Servers,
    /// Glance images
    Images,
    /// Nova flavors
    Flavors,
    /// Neutron networks
    Networks,
    /// Neutron routers
    Routers,
}

impl Resource {
    /// Collection name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Servers => "servers",
            Self::Images => "images",
            Self::Flavors => "flavors",
            Self::Networks => "networks",
            Self::Routers => "routers",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How records are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One human readable line per record
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// A listed record with a one-line text form.
pub trait Record: Serialize {
    /// Text form of the record.
    fn line(&self) -> String;
}

impl Record for Server {
    fn line(&self) -> String {
        format!("{} - {} - {}", self.name, self.id, self.status)
    }
}

impl Record for Image {
    fn line(&self) -> String {
        format!("{} - {} - {}", self.name_or_empty(), self.id, self.status)
    }
}

impl Record for Flavor {
    fn line(&self) -> String {
        format!(
            "{} - {} - {} vCPU, {} MiB RAM, {} GiB disk",
            self.name, self.id, self.vcpus, self.ram, self.disk
        )
    }
}

impl Record for Network {
    fn line(&self) -> String {
        let subnets: Vec<String> = self.subnets.iter().map(ToString::to_string).collect();
        format!("{} - {} - [{}]", self.name, self.id, subnets.join(", "))
    }
}

impl Record for Router {
    fn line(&self) -> String {
        format!(
            "{} - {} - {}",
            self.name,
            self.id,
            self.status.as_deref().unwrap_or("UNKNOWN")
        )
    }
}

/// Write every record of `stream` to `out` and return how many were written.
///
/// # Errors
///
/// Returns the stream's error as [`DeployError::Inventory`], or
/// [`DeployError::Output`] if writing fails.
pub async fn render<T, S, W>(
    resource: Resource,
    stream: S,
    format: OutputFormat,
    out: &mut W,
) -> Result<usize>
where
    T: Record,
    S: Stream<Item = ostack_core::Result<T>>,
    W: Write,
{
    let inventory_error = |source| DeployError::Inventory {
        resource: resource.as_str(),
        source,
    };
    let mut stream = std::pin::pin!(stream);
    let mut count = 0;

    while let Some(record) = stream.try_next().await.map_err(inventory_error)? {
        match format {
            OutputFormat::Text => writeln!(out, "{}", record.line())?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, &record).map_err(std::io::Error::from)?;
                writeln!(out)?;
            }
        }
        count += 1;
    }

    out.flush()?;
    debug!(%resource, count, "listed");
    Ok(count)
}

/// List one resource collection of `cloud`.
///
/// # Errors
///
/// Returns [`DeployError::Inventory`] if a page cannot be fetched.
pub async fn list<W: Write>(
    cloud: &OpenStackCloud,
    resource: Resource,
    format: OutputFormat,
    out: &mut W,
) -> Result<usize> {
    match resource {
        Resource::Servers => {
            let stream = cloud.compute().servers(ServerListParams::default());
            render(resource, stream, format, out).await
        }
        Resource::Images => {
            let stream = cloud.image().images(ImageListParams::default());
            render(resource, stream, format, out).await
        }
        Resource::Flavors => render(resource, cloud.compute().flavors(), format, out).await,
        Resource::Networks => {
            let stream = cloud.network().networks(NetworkListParams::default());
            render(resource, stream, format, out).await
        }
        Resource::Routers => {
            let stream = cloud.network().routers(RouterListParams::default());
            render(resource, stream, format, out).await
        }
    }
}
