//! Cloud operations used by the provisioner.
//!
//! [`Cloud`] is the seam between provisioning logic and the OpenStack
//! service clients; [`OpenStackCloud`] implements it on top of one
//! authenticated session.

use crate::error::{DeployError, Result as DeployResult};
use async_trait::async_trait;
use ostack_compute::{ComputeClient, CreateServerRequest, Flavor, Server, WaitOptions};
use ostack_core::config::{AuthConfig, ClientSettings};
use ostack_core::types::ServiceType;
use ostack_core::uuid::{NetworkId, RouterId, ServerId, SubnetId};
use ostack_core::Result;
use ostack_identity::{IdentityClientBuilder, Session};
use ostack_image::{Image, ImageClient};
use ostack_network::{
    CreateNetworkRequest, CreateRouterRequest, CreateSubnetRequest, Network, NetworkClient, Port,
    Router, RouterInterface, Subnet,
};
use tracing::info;

/// Operations the provisioner performs against a cloud.
///
/// `find_*` methods accept a name or an id and return `None` when nothing
/// matches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cloud: Send + Sync {
    /// Find a network by name or id.
    async fn find_network(&self, name_or_id: &str) -> Result<Option<Network>>;
    /// Create a network.
    async fn create_network(&self, name: &str) -> Result<Network>;
    /// Delete a network.
    async fn delete_network(&self, id: NetworkId) -> Result<()>;

    /// Find a subnet by name or id, optionally within one network.
    async fn find_subnet(
        &self,
        name_or_id: &str,
        network: Option<NetworkId>,
    ) -> Result<Option<Subnet>>;
    /// Create a subnet.
    async fn create_subnet(&self, request: &CreateSubnetRequest) -> Result<Subnet>;
    /// Delete a subnet.
    async fn delete_subnet(&self, id: SubnetId) -> Result<()>;

    /// Find an image by name or id.
    async fn find_image(&self, name_or_id: &str) -> Result<Option<Image>>;
    /// Find a flavor by name or id.
    async fn find_flavor(&self, name_or_id: &str) -> Result<Option<Flavor>>;

    /// Find a server by name or id.
    async fn find_server(&self, name_or_id: &str) -> Result<Option<Server>>;
    /// Boot a server.
    async fn create_server(&self, request: &CreateServerRequest) -> Result<ServerId>;
    /// Poll a server until it is `ACTIVE`.
    async fn wait_for_server(&self, id: ServerId, options: &WaitOptions) -> Result<Server>;
    /// Delete a server.
    async fn delete_server(&self, id: ServerId) -> Result<()>;
    /// Poll a deleted server until it is gone.
    async fn wait_for_server_deleted(&self, id: ServerId, options: &WaitOptions) -> Result<()>;

    /// Find a router by name or id.
    async fn find_router(&self, name_or_id: &str) -> Result<Option<Router>>;
    /// Create a router.
    async fn create_router(&self, name: &str) -> Result<Router>;
    /// Delete a router.
    async fn delete_router(&self, id: RouterId) -> Result<()>;

    /// The router's interface port on `subnet`, if attached.
    async fn router_interface_port(
        &self,
        router: RouterId,
        subnet: SubnetId,
    ) -> Result<Option<Port>>;
    /// Attach `subnet` to `router`.
    async fn add_router_interface(
        &self,
        router: RouterId,
        subnet: SubnetId,
    ) -> Result<RouterInterface>;
    /// Detach `subnet` from `router`.
    async fn remove_router_interface(&self, router: RouterId, subnet: SubnetId) -> Result<()>;
}

/// Service clients sharing one Keystone session.
#[derive(Debug, Clone)]
pub struct OpenStackCloud {
    session: Session,
    compute: ComputeClient,
    network: NetworkClient,
    image: ImageClient,
}

impl OpenStackCloud {
    /// Build the service clients from an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog lacks a compute, network or image
    /// endpoint.
    pub fn from_session(session: Session, settings: &ClientSettings) -> Result<Self> {
        let compute = ComputeClient::from_session(&session, settings)?;
        let network = NetworkClient::from_session(&session, settings)?;
        let image = ImageClient::from_session(&session, settings)?;
        Ok(Self {
            session,
            compute,
            network,
            image,
        })
    }

    /// The session the clients authenticate with.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Nova client.
    #[must_use]
    pub const fn compute(&self) -> &ComputeClient {
        &self.compute
    }

    /// Neutron client.
    #[must_use]
    pub const fn network(&self) -> &NetworkClient {
        &self.network
    }

    /// Glance client.
    #[must_use]
    pub const fn image(&self) -> &ImageClient {
        &self.image
    }
}

/// Authenticate once and build the service clients.
///
/// # Errors
///
/// Returns [`DeployError::Config`] when no password is available or the
/// client settings are unusable, and [`DeployError::Connect`] when Keystone
/// rejects the request or the catalog lacks a required service.
pub async fn connect(auth: &AuthConfig, settings: &ClientSettings) -> DeployResult<OpenStackCloud> {
    auth.password()
        .map_err(|e| DeployError::Config(e.to_string()))?;
    let http = settings
        .client_config(ServiceType::Identity)
        .map_err(|e| DeployError::Config(e.to_string()))?;

    let connect_error = |source| DeployError::Connect {
        auth_url: auth.auth_url.clone(),
        source,
    };

    let auth_url = auth
        .parse_auth_url()
        .map_err(|e| DeployError::Config(e.to_string()))?;
    let identity = IdentityClientBuilder::new(auth_url)
        .map_err(|e| DeployError::Config(e.to_string()))?
        .with_http_config(http)
        .build()
        .map_err(connect_error)?;
    let session = identity
        .authenticate(auth)
        .await
        .map_err(connect_error)?
        .with_interface(settings.interface);

    let cloud = OpenStackCloud::from_session(session, settings).map_err(connect_error)?;
    info!(
        project = %auth.project_name,
        region = cloud.session().region().unwrap_or("any"),
        compute = %cloud.compute().base_url(),
        network = %cloud.network().base_url(),
        image = %cloud.image().base_url(),
        "connected"
    );
    Ok(cloud)
}

#[async_trait]
impl Cloud for OpenStackCloud {
    async fn find_network(&self, name_or_id: &str) -> Result<Option<Network>> {
        self.network.find_network(name_or_id).await
    }

    async fn create_network(&self, name: &str) -> Result<Network> {
        self.network
            .create_network(&CreateNetworkRequest::new(name))
            .await
    }

    async fn delete_network(&self, id: NetworkId) -> Result<()> {
        self.network.delete_network(id).await
    }

    async fn find_subnet(
        &self,
        name_or_id: &str,
        network: Option<NetworkId>,
    ) -> Result<Option<Subnet>> {
        self.network.find_subnet(name_or_id, network).await
    }

    async fn create_subnet(&self, request: &CreateSubnetRequest) -> Result<Subnet> {
        self.network.create_subnet(request).await
    }

    async fn delete_subnet(&self, id: SubnetId) -> Result<()> {
        self.network.delete_subnet(id).await
    }

    async fn find_image(&self, name_or_id: &str) -> Result<Option<Image>> {
        self.image.find_image(name_or_id).await
    }

    async fn find_flavor(&self, name_or_id: &str) -> Result<Option<Flavor>> {
        self.compute.find_flavor(name_or_id).await
    }

    async fn find_server(&self, name_or_id: &str) -> Result<Option<Server>> {
        self.compute.find_server(name_or_id).await
    }

    async fn create_server(&self, request: &CreateServerRequest) -> Result<ServerId> {
        self.compute.create_server(request).await
    }

    async fn wait_for_server(&self, id: ServerId, options: &WaitOptions) -> Result<Server> {
        self.compute.wait_for_server(id, options).await
    }

    async fn delete_server(&self, id: ServerId) -> Result<()> {
        self.compute.delete_server(id).await
    }

    async fn wait_for_server_deleted(&self, id: ServerId, options: &WaitOptions) -> Result<()> {
        self.compute.wait_for_server_deleted(id, options).await
    }

    async fn find_router(&self, name_or_id: &str) -> Result<Option<Router>> {
        self.network.find_router(name_or_id).await
    }

    async fn create_router(&self, name: &str) -> Result<Router> {
        self.network
            .create_router(&CreateRouterRequest::new(name))
            .await
    }

    async fn delete_router(&self, id: RouterId) -> Result<()> {
        self.network.delete_router(id).await
    }

    async fn router_interface_port(
        &self,
        router: RouterId,
        subnet: SubnetId,
    ) -> Result<Option<Port>> {
        self.network.router_interface_port(router, subnet).await
    }

    async fn add_router_interface(
        &self,
        router: RouterId,
        subnet: SubnetId,
    ) -> Result<RouterInterface> {
        self.network.add_router_interface(router, subnet).await
    }

    async fn remove_router_interface(&self, router: RouterId, subnet: SubnetId) -> Result<()> {
        self.network
            .remove_router_interface(router, subnet)
            .await
            .map(|_| ())
    }
}
