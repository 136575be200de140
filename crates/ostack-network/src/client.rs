//! Asynchronous Neutron client implementation.

use futures::Stream;
use ostack_core::client::{ClientConfig, RetryPolicy, ServiceClient, ServiceClientBuilder};
use ostack_core::config::ClientSettings;
use ostack_core::query::{paginate, single_match, PageRequest};
use ostack_core::types::ServiceType;
use ostack_core::uuid::{looks_like_uuid, NetworkId, RouterId, SubnetId};
use ostack_core::Error;
use ostack_identity::Session;
use reqwest::Method;
use tracing::{debug, info};
use url::Url;

use crate::models::{
    CreateNetworkRequest, CreateRouterRequest, CreateSubnetRequest, Network, NetworkEnvelope,
    NetworkListParams, NetworksEnvelope, Port, PortListParams, PortsEnvelope, Router,
    RouterEnvelope, RouterInterface, RouterInterfaceRequest, RouterListParams, RoutersEnvelope,
    Subnet, SubnetEnvelope, SubnetListParams, SubnetsEnvelope,
};
use crate::Result;

const USER_AGENT: &str = concat!("ostack-network/", env!("CARGO_PKG_VERSION"));

const NETWORK_API_VERSION: &str = "v2.0";

/// Builder for [`NetworkClient`].
#[derive(Debug, Clone)]
pub struct NetworkClientBuilder {
    inner: ServiceClientBuilder,
}

impl NetworkClientBuilder {
    /// Create a builder for the specified versioned endpoint, e.g.
    /// `https://neutron.example:9696/v2.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let builder = ServiceClientBuilder::new(
            ServiceType::Network,
            base_url,
            ServiceType::Network.default_timeout(),
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

    /// Build the client instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<NetworkClient> {
        let inner = self.inner.build()?;
        Ok(NetworkClient { inner })
    }
}

/// Asynchronous client for Neutron.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    inner: ServiceClient,
}

impl NetworkClient {
    /// Construct directly from a base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        NetworkClientBuilder::new(base_url)?.build()
    }

    /// Construct a client from the session's network catalog endpoint,
    /// appending `/v2.0` when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog has no network endpoint.
    pub fn from_session(session: &Session, settings: &ClientSettings) -> Result<Self> {
        let inner =
            session.service_client(ServiceType::Network, Some(NETWORK_API_VERSION), settings)?;
        Ok(Self { inner })
    }

    /// Access the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    // Networks

    /// List one page of networks.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_networks(
        &self,
        params: &NetworkListParams,
        page: &PageRequest,
    ) -> Result<Vec<Network>> {
        let envelope: NetworksEnvelope = self
            .inner
            .get_json("networks", &params.to_pairs(page))
            .await?;
        Ok(envelope.networks)
    }

    /// Stream every network matching `params`, fetching pages lazily.
    pub fn networks(&self, params: NetworkListParams) -> impl Stream<Item = Result<Network>> + '_ {
        paginate(PageRequest::default(), move |page| {
            let params = params.clone();
            async move { self.list_networks(&params, &page).await }
        })
    }

    /// Fetch a network by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the network does not exist.
    pub async fn get_network(&self, id: NetworkId) -> Result<Network> {
        let path = format!("networks/{id}");
        let envelope: NetworkEnvelope = self.inner.get_json(&path, &[]).await?;
        Ok(envelope.network)
    }

    /// Find a network by id or exact name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if several networks share the name.
    pub async fn find_network(&self, name_or_id: &str) -> Result<Option<Network>> {
        if looks_like_uuid(name_or_id) {
            match self.get_network(NetworkId::parse_str(name_or_id)?).await {
                Ok(network) => return Ok(Some(network)),
                Err(Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let params = NetworkListParams {
            name: Some(name_or_id.to_string()),
            ..NetworkListParams::default()
        };
        let networks = self.list_networks(&params, &PageRequest::default()).await?;
        single_match("network", name_or_id, networks)
    }

    /// Create a network.
    ///
    /// # Errors
    ///
    /// Returns an error if Neutron rejects the request.
    pub async fn create_network(&self, request: &CreateNetworkRequest) -> Result<Network> {
        let body = NetworkEnvelope { network: request };
        let envelope: NetworkEnvelope = self
            .inner
            .send_json(Method::POST, "networks", Some(&body), &[])
            .await?;
        info!(name = %envelope.network.name, id = %envelope.network.id, "network created");
        Ok(envelope.network)
    }

    /// Delete a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_network(&self, id: NetworkId) -> Result<()> {
        let path = format!("networks/{id}");
        self.inner.send_empty(Method::DELETE, &path).await
    }

    // Subnets

    /// List one page of subnets.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_subnets(
        &self,
        params: &SubnetListParams,
        page: &PageRequest,
    ) -> Result<Vec<Subnet>> {
        let envelope: SubnetsEnvelope = self
            .inner
            .get_json("subnets", &params.to_pairs(page))
            .await?;
        Ok(envelope.subnets)
    }

    /// Fetch a subnet by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the subnet does not exist.
    pub async fn get_subnet(&self, id: SubnetId) -> Result<Subnet> {
        let path = format!("subnets/{id}");
        let envelope: SubnetEnvelope = self.inner.get_json(&path, &[]).await?;
        Ok(envelope.subnet)
    }

    /// Find a subnet by id or exact name, optionally within one network.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if several subnets share the name.
    pub async fn find_subnet(
        &self,
        name_or_id: &str,
        network: Option<NetworkId>,
    ) -> Result<Option<Subnet>> {
        if looks_like_uuid(name_or_id) {
            match self.get_subnet(SubnetId::parse_str(name_or_id)?).await {
                Ok(subnet) => return Ok(Some(subnet)),
                Err(Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let params = SubnetListParams {
            name: Some(name_or_id.to_string()),
            network_id: network,
        };
        let subnets = self.list_subnets(&params, &PageRequest::default()).await?;
        single_match("subnet", name_or_id, subnets)
    }

    /// Create a subnet.
    ///
    /// # Errors
    ///
    /// Returns an error if Neutron rejects the request, e.g. for an
    /// overlapping CIDR.
    pub async fn create_subnet(&self, request: &CreateSubnetRequest) -> Result<Subnet> {
        let body = SubnetEnvelope { subnet: request };
        let envelope: SubnetEnvelope = self
            .inner
            .send_json(Method::POST, "subnets", Some(&body), &[])
            .await?;
        info!(
            name = %envelope.subnet.name,
            id = %envelope.subnet.id,
            cidr = %envelope.subnet.cidr,
            "subnet created"
        );
        Ok(envelope.subnet)
    }

    /// Delete a subnet.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_subnet(&self, id: SubnetId) -> Result<()> {
        let path = format!("subnets/{id}");
        self.inner.send_empty(Method::DELETE, &path).await
    }

    // Routers

    /// List one page of routers.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_routers(
        &self,
        params: &RouterListParams,
        page: &PageRequest,
    ) -> Result<Vec<Router>> {
        let envelope: RoutersEnvelope = self
            .inner
            .get_json("routers", &params.to_pairs(page))
            .await?;
        Ok(envelope.routers)
    }

    /// Stream every router matching `params`, fetching pages lazily.
    pub fn routers(&self, params: RouterListParams) -> impl Stream<Item = Result<Router>> + '_ {
        paginate(PageRequest::default(), move |page| {
            let params = params.clone();
            async move { self.list_routers(&params, &page).await }
        })
    }

    /// Fetch a router by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the router does not exist.
    pub async fn get_router(&self, id: RouterId) -> Result<Router> {
        let path = format!("routers/{id}");
        let envelope: RouterEnvelope = self.inner.get_json(&path, &[]).await?;
        Ok(envelope.router)
    }

    /// Find a router by id or exact name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if several routers share the name.
    pub async fn find_router(&self, name_or_id: &str) -> Result<Option<Router>> {
        if looks_like_uuid(name_or_id) {
            match self.get_router(RouterId::parse_str(name_or_id)?).await {
                Ok(router) => return Ok(Some(router)),
                Err(Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let params = RouterListParams {
            name: Some(name_or_id.to_string()),
        };
        let routers = self.list_routers(&params, &PageRequest::default()).await?;
        single_match("router", name_or_id, routers)
    }

    /// Create a router.
    ///
    /// # Errors
    ///
    /// Returns an error if Neutron rejects the request.
    pub async fn create_router(&self, request: &CreateRouterRequest) -> Result<Router> {
        let body = RouterEnvelope { router: request };
        let envelope: RouterEnvelope = self
            .inner
            .send_json(Method::POST, "routers", Some(&body), &[])
            .await?;
        info!(name = %envelope.router.name, id = %envelope.router.id, "router created");
        Ok(envelope.router)
    }

    /// Delete a router. Its interfaces must have been removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_router(&self, id: RouterId) -> Result<()> {
        let path = format!("routers/{id}");
        self.inner.send_empty(Method::DELETE, &path).await
    }

    /// Attach `subnet` to `router`.
    ///
    /// Sent once: a repeated attach fails with `BadRequest`.
    ///
    /// # Errors
    ///
    /// Returns an error if Neutron rejects the attachment, e.g. because the
    /// subnet is already attached.
    pub async fn add_router_interface(
        &self,
        router: RouterId,
        subnet: SubnetId,
    ) -> Result<RouterInterface> {
        let path = format!("routers/{router}/add_router_interface");
        let body = RouterInterfaceRequest { subnet_id: subnet };
        let interface: RouterInterface = self
            .inner
            .send_json_once(Method::PUT, &path, Some(&body), &[])
            .await?;
        info!(%router, %subnet, port = %interface.port_id, "router interface added");
        Ok(interface)
    }

    /// Detach `subnet` from `router`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn remove_router_interface(
        &self,
        router: RouterId,
        subnet: SubnetId,
    ) -> Result<RouterInterface> {
        let path = format!("routers/{router}/remove_router_interface");
        let body = RouterInterfaceRequest { subnet_id: subnet };
        self.inner
            .send_json_once(Method::PUT, &path, Some(&body), &[])
            .await
    }

    // Ports

    /// List ports.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_ports(&self, params: &PortListParams) -> Result<Vec<Port>> {
        let envelope: PortsEnvelope = self.inner.get_json("ports", &params.to_pairs()).await?;
        Ok(envelope.ports)
    }

    /// The router's interface port on `subnet`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the port listing fails.
    pub async fn router_interface_port(
        &self,
        router: RouterId,
        subnet: SubnetId,
    ) -> Result<Option<Port>> {
        let ports = self.list_ports(&PortListParams::router_ports(router)).await?;
        debug!(%router, ports = ports.len(), "router ports");
        Ok(ports
            .into_iter()
            .find(|port| port.is_router_interface() && port.is_on_subnet(subnet)))
    }
}
