//! Asynchronous Nova client implementation.

use std::time::Duration;

use futures::{future, Stream, TryStreamExt};
use ostack_core::client::{ClientConfig, RetryPolicy, ServiceClient, ServiceClientBuilder};
use ostack_core::config::ClientSettings;
use ostack_core::query::{paginate, single_match, PageRequest, QueryParams};
use ostack_core::types::ServiceType;
use ostack_core::uuid::{looks_like_uuid, ServerId};
use ostack_core::Error;
use ostack_identity::Session;
use reqwest::Method;
use secrecy::SecretString;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{
    CreateServerEnvelope, CreateServerRequest, CreatedServer, Flavor, FlavorEnvelope, FlavorId,
    FlavorsEnvelope, Server, ServerEnvelope, ServerListParams, ServerStatus, ServersEnvelope,
};
use crate::Result;

const USER_AGENT: &str = concat!("ostack-compute/", env!("CARGO_PKG_VERSION"));

/// Default upper bound on waiting for a server to become `ACTIVE`.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default delay between two status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long and how often to poll a server's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long
    pub timeout: Duration,
    /// Delay between polls
    pub interval: Duration,
}

impl WaitOptions {
    /// Options with the default timeout and interval.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ComputeClient`].
#[derive(Debug, Clone)]
pub struct ComputeClientBuilder {
    inner: ServiceClientBuilder,
}

impl ComputeClientBuilder {
    /// Create a builder for the specified versioned endpoint, e.g.
    /// `https://nova.example:8774/v2.1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let builder = ServiceClientBuilder::new(
            ServiceType::Compute,
            base_url,
            ServiceType::Compute.default_timeout(),
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

    /// Configure the `X-Auth-Token` header.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.inner = self.inner.with_token(token);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ComputeClient> {
        let inner = self.inner.build()?;
        Ok(ComputeClient { inner })
    }
}

/// Asynchronous Nova client.
#[derive(Debug, Clone)]
pub struct ComputeClient {
    inner: ServiceClient,
}

impl ComputeClient {
    /// Construct a client directly from the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        ComputeClientBuilder::new(base_url)?.build()
    }

    /// Construct a client from the session's compute catalog endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog has no compute endpoint.
    pub fn from_session(session: &Session, settings: &ClientSettings) -> Result<Self> {
        let inner = session.service_client(ServiceType::Compute, None, settings)?;
        Ok(Self { inner })
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// List one page of servers with details.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_servers(
        &self,
        params: &ServerListParams,
        page: &PageRequest,
    ) -> Result<Vec<Server>> {
        let envelope: ServersEnvelope = self
            .inner
            .get_json("servers/detail", &params.to_pairs(page))
            .await?;
        Ok(envelope.servers)
    }

    /// Stream every server matching `params`, fetching pages lazily.
    pub fn servers(&self, params: ServerListParams) -> impl Stream<Item = Result<Server>> + '_ {
        paginate(PageRequest::default(), move |page| {
            let params = params.clone();
            async move { self.list_servers(&params, &page).await }
        })
    }

    /// Fetch a server by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the server does not exist.
    pub async fn get_server(&self, id: ServerId) -> Result<Server> {
        let path = format!("servers/{id}");
        let envelope: ServerEnvelope<Server> = self.inner.get_json(&path, &[]).await?;
        Ok(envelope.server)
    }

    /// Find a server by id or exact name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if several servers share the name.
    pub async fn find_server(&self, name_or_id: &str) -> Result<Option<Server>> {
        if looks_like_uuid(name_or_id) {
            let id = ServerId::parse_str(name_or_id)?;
            match self.get_server(id).await {
                Ok(server) => return Ok(Some(server)),
                Err(Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        // Nova matches `name` as a regex; keep exact matches only.
        let params = ServerListParams {
            name: Some(format!("^{}$", escape_regex(name_or_id))),
            status: None,
        };
        let servers: Vec<Server> = self
            .list_servers(&params, &PageRequest::default())
            .await?
            .into_iter()
            .filter(|server| server.name == name_or_id)
            .collect();
        single_match("server", name_or_id, servers)
    }

    /// Boot a server.
    ///
    /// # Errors
    ///
    /// Returns an error if Nova rejects the request.
    pub async fn create_server(&self, request: &CreateServerRequest) -> Result<ServerId> {
        let body = CreateServerEnvelope { server: request };
        let envelope: ServerEnvelope<CreatedServer> = self
            .inner
            .send_json(Method::POST, "servers", Some(&body), &[])
            .await?;
        info!(name = %request.name, id = %envelope.server.id, "server created");
        Ok(envelope.server.id)
    }

    /// Delete a server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_server(&self, id: ServerId) -> Result<()> {
        let path = format!("servers/{id}");
        self.inner.send_empty(Method::DELETE, &path).await
    }

    /// Poll a server until it is `ACTIVE`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidServerState`] if the server enters a failed
    /// or stopped status, or [`Error::Timeout`] once `options.timeout` has elapsed.
    pub async fn wait_for_server(&self, id: ServerId, options: &WaitOptions) -> Result<Server> {
        let deadline = Instant::now() + options.timeout;
        let mut polls = 0u32;

        loop {
            let server = self.get_server(id).await?;
            polls += 1;
            debug!(%id, status = %server.status, polls, "polled server status");

            if server.status == ServerStatus::Active {
                info!(%id, name = %server.name, polls, "server active");
                return Ok(server);
            }
            if server.status.is_failed() || server.status.is_stopped() {
                let reason = server
                    .fault
                    .as_ref()
                    .map_or_else(String::new, |fault| format!(": {}", fault.message));
                return Err(Error::InvalidServerState(format!(
                    "server {} ({id}) entered {}{reason}",
                    server.name, server.status
                )));
            }
            if Instant::now() + options.interval > deadline {
                warn!(%id, status = %server.status, "gave up waiting for server");
                return Err(Error::Timeout(format!(
                    "server {} ({id}) still {} after {:?}",
                    server.name, server.status, options.timeout
                )));
            }
            sleep(options.interval).await;
        }
    }

    /// Poll a deleted server until Nova no longer returns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] once `options.timeout` has elapsed, or the
    /// polling error if it is anything but [`Error::NotFound`].
    pub async fn wait_for_server_deleted(&self, id: ServerId, options: &WaitOptions) -> Result<()> {
        let deadline = Instant::now() + options.timeout;

        loop {
            let status = match self.get_server(id).await {
                Ok(server) if server.status == ServerStatus::Deleted => return Ok(()),
                Ok(server) => server.status,
                Err(Error::NotFound(_)) => return Ok(()),
                Err(err) => return Err(err),
            };
            debug!(%id, %status, "server still present");

            if Instant::now() + options.interval > deadline {
                return Err(Error::Timeout(format!(
                    "server {id} still {status} after {:?}",
                    options.timeout
                )));
            }
            sleep(options.interval).await;
        }
    }

    /// List one page of flavors with details.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_flavors(&self, page: &PageRequest) -> Result<Vec<Flavor>> {
        let mut params = QueryParams::new();
        params.push_page(page);
        let envelope: FlavorsEnvelope = self
            .inner
            .get_json("flavors/detail", &params.into_pairs())
            .await?;
        Ok(envelope.flavors)
    }

    /// Stream every flavor, fetching pages lazily.
    pub fn flavors(&self) -> impl Stream<Item = Result<Flavor>> + '_ {
        paginate(PageRequest::default(), move |page| async move {
            self.list_flavors(&page).await
        })
    }

    /// Fetch a flavor by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the flavor does not exist.
    pub async fn get_flavor(&self, id: &FlavorId) -> Result<Flavor> {
        let path = format!("flavors/{id}");
        let envelope: FlavorEnvelope = self.inner.get_json(&path, &[]).await?;
        Ok(envelope.flavor)
    }

    /// Find a flavor by id or exact name.
    ///
    /// Flavor ids are free-form, so the id lookup is always tried first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if several flavors share the name.
    pub async fn find_flavor(&self, name_or_id: &str) -> Result<Option<Flavor>> {
        match self.get_flavor(&FlavorId::new(name_or_id)).await {
            Ok(flavor) => return Ok(Some(flavor)),
            Err(Error::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let flavors: Vec<Flavor> = self
            .flavors()
            .try_filter(|flavor| future::ready(flavor.name == name_or_id))
            .try_collect()
            .await?;
        single_match("flavor", name_or_id, flavors)
    }
}

fn escape_regex(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostack_core::uuid::{ImageId, NetworkId};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> ComputeClient {
        ComputeClientBuilder::new(format!("{}/compute/v2.1", server.uri()))
            .unwrap()
            .with_retry_policy(RetryPolicy::no_retry())
            .build()
            .unwrap()
    }

    fn fast_wait() -> WaitOptions {
        WaitOptions::new()
            .with_timeout(Duration::from_millis(200))
            .with_interval(Duration::from_millis(5))
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert_eq!(escape_regex("Calc2"), "Calc2");
        assert_eq!(escape_regex("a.b(1)"), "a\\.b\\(1\\)");
    }

    #[tokio::test]
    async fn create_server_posts_envelope() {
        let server = MockServer::start().await;
        let id = ServerId::new_v4();
        let image = ImageId::new_v4();
        let network = NetworkId::new_v4();

        Mock::given(method("POST"))
            .and(path("/compute/v2.1/servers"))
            .and(body_json(json!({
                "server": {
                    "name": "Calc2",
                    "imageRef": image,
                    "flavorRef": "nano-id",
                    "networks": [{"uuid": network}],
                    "key_name": "calcKeyPair"
                }
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "server": {"id": id, "adminPass": "x", "links": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CreateServerRequest::new("Calc2", image, FlavorId::new("nano-id"), network)
            .with_key_name("calcKeyPair");
        let created = test_client(&server).create_server(&request).await.unwrap();
        assert_eq!(created, id);
    }

    #[tokio::test]
    async fn wait_for_server_polls_until_active() {
        let server = MockServer::start().await;
        let id = ServerId::new_v4();
        let url = format!("/compute/v2.1/servers/{id}");

        Mock::given(method("GET"))
            .and(path(url.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {"id": id, "name": "Mul2", "status": "BUILD"}
            })))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(url.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {"id": id, "name": "Mul2", "status": "ACTIVE"}
            })))
            .mount(&server)
            .await;

        let active = test_client(&server)
            .wait_for_server(id, &fast_wait())
            .await
            .unwrap();
        assert_eq!(active.status, ServerStatus::Active);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn wait_for_server_stops_on_shutoff() {
        let server = MockServer::start().await;
        let id = ServerId::new_v4();

        Mock::given(method("GET"))
            .and(path(format!("/compute/v2.1/servers/{id}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {"id": id, "name": "Mul2", "status": "SHUTOFF"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server)
            .wait_for_server(id, &fast_wait())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidServerState(ref m) if m.contains("SHUTOFF")));
    }

    #[tokio::test]
    async fn wait_for_server_fails_on_error_status() {
        let server = MockServer::start().await;
        let id = ServerId::new_v4();

        Mock::given(method("GET"))
            .and(path(format!("/compute/v2.1/servers/{id}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {
                    "id": id,
                    "name": "Sub2",
                    "status": "ERROR",
                    "fault": {"code": 500, "message": "No valid host was found."}
                }
            })))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .wait_for_server(id, &fast_wait())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidServerState(ref m) if m.contains("No valid host")));
    }

    #[tokio::test]
    async fn wait_for_server_times_out() {
        let server = MockServer::start().await;
        let id = ServerId::new_v4();

        Mock::given(method("GET"))
            .and(path(format!("/compute/v2.1/servers/{id}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {"id": id, "name": "Sum2", "status": "BUILD"}
            })))
            .mount(&server)
            .await;

        let options = WaitOptions::new()
            .with_timeout(Duration::from_millis(30))
            .with_interval(Duration::from_millis(10));
        let err = test_client(&server)
            .wait_for_server(id, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn wait_for_server_deleted_stops_on_not_found() {
        let server = MockServer::start().await;
        let id = ServerId::new_v4();
        let url = format!("/compute/v2.1/servers/{id}");

        Mock::given(method("GET"))
            .and(path(url.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {"id": id, "name": "Div2", "status": "ACTIVE"}
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(url.as_str()))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "itemNotFound": {"code": 404, "message": "Instance could not be found."}
            })))
            .mount(&server)
            .await;

        test_client(&server)
            .wait_for_server_deleted(id, &fast_wait())
            .await
            .unwrap();
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn find_server_by_exact_name() {
        let server = MockServer::start().await;
        let id = ServerId::new_v4();

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .and(query_param("name", "^Calc2$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [
                    {"id": id, "name": "Calc2", "status": "ACTIVE"},
                    {"id": ServerId::new_v4(), "name": "Calc2-old", "status": "ACTIVE"}
                ]
            })))
            .mount(&server)
            .await;

        let found = test_client(&server).find_server("Calc2").await.unwrap();
        assert_eq!(found.map(|s| s.id), Some(id));
    }

    #[tokio::test]
    async fn find_server_missing_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"servers": []})))
            .mount(&server)
            .await;

        assert!(test_client(&server)
            .find_server("Div2")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn find_flavor_falls_back_to_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/flavors/nano"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "itemNotFound": {"code": 404, "message": "Flavor nano could not be found."}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/flavors/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "flavors": [
                    {"id": "1", "name": "m1.tiny", "vcpus": 1, "ram": 512, "disk": 1},
                    {"id": "c1", "name": "nano", "vcpus": 1, "ram": 64, "disk": 0}
                ]
            })))
            .mount(&server)
            .await;

        let flavor = test_client(&server)
            .find_flavor("nano")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(flavor.id, FlavorId::new("c1"));
        assert_eq!(flavor.ram, 64);
    }

    #[tokio::test]
    async fn find_flavor_rejects_duplicate_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/flavors/nano"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/flavors/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "flavors": [
                    {"id": "a", "name": "nano"},
                    {"id": "b", "name": "nano"}
                ]
            })))
            .mount(&server)
            .await;

        let err = test_client(&server).find_flavor("nano").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn servers_stream_follows_markers() {
        let server = MockServer::start().await;
        let first: Vec<serde_json::Value> = (0..100)
            .map(|i| json!({"id": ServerId::new_v4(), "name": format!("vm{i}")}))
            .collect();
        let last_id = first[99]["id"].as_str().unwrap().to_string();

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .and(query_param("marker", last_id.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{"id": ServerId::new_v4(), "name": "tail"}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"servers": first})))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let servers: Vec<Server> = client
            .servers(ServerListParams::default())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(servers.len(), 101);
        assert_eq!(servers[100].name, "tail");
    }

    #[tokio::test]
    async fn delete_server_accepts_no_content() {
        let server = MockServer::start().await;
        let id = ServerId::new_v4();
        Mock::given(method("DELETE"))
            .and(path(format!("/compute/v2.1/servers/{id}").as_str()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server).delete_server(id).await.unwrap();
    }
}
