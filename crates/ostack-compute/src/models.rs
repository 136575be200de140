//! Nova models shared by the client and the deployment tooling.

use chrono::{DateTime, Utc};
use ostack_core::query::{PageRequest, Paged, QueryParams};
use ostack_core::uuid::{ImageId, NetworkId, ServerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameters supported by the `/servers/detail` list endpoint.
#[derive(Debug, Default, Clone)]
pub struct ServerListParams {
    /// Filter by name. Nova treats this as a regular expression.
    pub name: Option<String>,
    /// Filter by status.
    pub status: Option<ServerStatus>,
}

impl ServerListParams {
    /// Convert the parameters and a page cursor into URL query pairs.
    #[must_use]
    pub fn to_pairs(&self, page: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("name", self.name.as_deref());
        params.push_opt("status", self.status);
        params.push_page(page);
        params.into_pairs()
    }
}

/// Server lifecycle status as reported by Nova.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    /// Running and reachable
    Active,
    /// Being built
    Build,
    /// Failed
    Error,
    /// Powered off
    Shutoff,
    /// Soft reboot in progress
    Reboot,
    /// Hard reboot in progress
    HardReboot,
    /// Rebuild in progress
    Rebuild,
    /// Resize in progress
    Resize,
    /// Waiting for resize confirmation
    VerifyResize,
    /// Live migration in progress
    Migrating,
    /// Paused
    Paused,
    /// Suspended
    Suspended,
    /// Deleted but not yet purged
    Deleted,
    /// Any status this client does not know about
    #[default]
    #[serde(other)]
    Unknown,
}

impl ServerStatus {
    /// The status as Nova spells it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Build => "BUILD",
            Self::Error => "ERROR",
            Self::Shutoff => "SHUTOFF",
            Self::Reboot => "REBOOT",
            Self::HardReboot => "HARD_REBOOT",
            Self::Rebuild => "REBUILD",
            Self::Resize => "RESIZE",
            Self::VerifyResize => "VERIFY_RESIZE",
            Self::Migrating => "MIGRATING",
            Self::Paused => "PAUSED",
            Self::Suspended => "SUSPENDED",
            Self::Deleted => "DELETED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns true for statuses a server will not leave on its own while
    /// waiting for `ACTIVE`.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Error | Self::Deleted)
    }

    /// Returns true for statuses that need an explicit start, unpause or
    /// resume before the server becomes `ACTIVE` again.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::Shutoff | Self::Paused | Self::Suspended)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form flavor identifier; Nova does not require UUIDs here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlavorId(String);

impl FlavorId {
    /// Wrap a flavor id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlavorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fixed-IP or floating address attached to a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerAddress {
    /// IP address.
    pub addr: String,
    /// 4 or 6.
    #[serde(default)]
    pub version: u8,
    /// `fixed` or `floating`.
    #[serde(
        rename = "OS-EXT-IPS:type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
}

/// Fault recorded on a server in `ERROR` state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerFault {
    /// HTTP-like fault code.
    #[serde(default)]
    pub code: u16,
    /// Fault message.
    #[serde(default)]
    pub message: String,
}

/// Flavor reference embedded in a server record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlavorRef {
    /// Flavor id (microversions before 2.47).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FlavorId>,
    /// Flavor name (microversion 2.47 and later).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

/// Representation of a server as returned by Nova.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Server {
    /// Server id.
    pub id: ServerId,
    /// Server name.
    pub name: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ServerStatus,
    /// Flavor reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<FlavorRef>,
    /// Addresses keyed by network name.
    #[serde(default)]
    pub addresses: BTreeMap<String, Vec<ServerAddress>>,
    /// Keypair injected at boot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Fault details when the server is in `ERROR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<ServerFault>,
}

impl Paged for Server {
    fn marker(&self) -> String {
        self.id.to_string()
    }
}

/// Network attachment requested at boot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerNetwork {
    /// Network to attach a port on.
    pub uuid: NetworkId,
}

/// Payload for `POST /servers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateServerRequest {
    /// Server name.
    pub name: String,
    /// Boot image.
    #[serde(rename = "imageRef")]
    pub image_ref: ImageId,
    /// Flavor.
    #[serde(rename = "flavorRef")]
    pub flavor_ref: FlavorId,
    /// Network attachments.
    pub networks: Vec<ServerNetwork>,
    /// Keypair to inject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
}

impl CreateServerRequest {
    /// A request attaching the server to a single network.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        image_ref: ImageId,
        flavor_ref: FlavorId,
        network: NetworkId,
    ) -> Self {
        Self {
            name: name.into(),
            image_ref,
            flavor_ref,
            networks: vec![ServerNetwork { uuid: network }],
            key_name: None,
        }
    }

    /// Inject a keypair.
    #[must_use]
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }
}

/// The minimal body Nova returns from `POST /servers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedServer {
    /// New server id.
    pub id: ServerId,
}

/// Representation of a flavor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flavor {
    /// Flavor id.
    pub id: FlavorId,
    /// Flavor name.
    pub name: String,
    /// Virtual CPUs.
    #[serde(default)]
    pub vcpus: u32,
    /// Memory in MiB.
    #[serde(default)]
    pub ram: u64,
    /// Root disk in GiB.
    #[serde(default)]
    pub disk: u64,
}

impl Paged for Flavor {
    fn marker(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateServerEnvelope<'a> {
    pub server: &'a CreateServerRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerEnvelope<T> {
    pub server: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServersEnvelope {
    pub servers: Vec<Server>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlavorEnvelope {
    pub flavor: Flavor,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlavorsEnvelope {
    pub flavors: Vec<Flavor>,
}
