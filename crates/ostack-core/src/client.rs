//! HTTP client utilities and retry logic.
//!
//! This module provides the HTTP client configuration, the retry policy and
//! [`ServiceClient`], the request executor every OpenStack service crate wraps.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Certificate, Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::types::ServiceType;

// Service-specific timeout configurations (in seconds)

/// Default timeout for Keystone requests
pub const IDENTITY_DEFAULT_TIMEOUT: u64 = 15;

/// Default timeout for Nova requests
pub const COMPUTE_DEFAULT_TIMEOUT: u64 = 30;

/// Default timeout for Neutron requests
pub const NETWORK_DEFAULT_TIMEOUT: u64 = 20;

/// Default timeout for Glance requests (larger for image listings)
pub const IMAGE_DEFAULT_TIMEOUT: u64 = 60;

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

// Retry settings

/// Default maximum number of retry attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial retry delay in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Default maximum retry delay in milliseconds (for exponential backoff)
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;

/// Header carrying the Keystone token on every service request.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Maps a non-success HTTP status onto an [`Error`].
pub type StatusMapper = fn(ServiceType, StatusCode, String) -> Error;

/// Retry policy with exponential backoff.
///
/// Configures how HTTP requests should be retried on failure, using exponential
/// backoff to avoid overwhelming failing services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Initial delay before first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,

    /// Backoff multiplier (typically 2 for exponential backoff)
    pub backoff_multiplier: u32,
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            backoff_multiplier: 2,
        }
    }

    /// Create a retry policy with no retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1,
        }
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculate delay for a given attempt number.
    ///
    /// Uses exponential backoff: delay = min(initial_delay * multiplier^(attempt-1), max_delay)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let multiplier = self.backoff_multiplier.saturating_pow(attempt - 1);
        let delay = self.initial_delay.saturating_mul(multiplier);

        std::cmp::min(delay, self.max_delay)
    }

    /// Check if retries are enabled.
    #[must_use]
    pub const fn has_retries(&self) -> bool {
        self.max_retries > 0
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client configuration.
///
/// Configures HTTP client behavior including timeouts, retries, TLS and
/// connection pooling.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Retry policy
    pub retry_policy: RetryPolicy,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable response compression
    pub enable_compression: bool,

    /// Verify server TLS certificates
    pub tls_verify: bool,

    /// Additional PEM-encoded root certificate
    pub root_certificate_pem: Option<Vec<u8>>,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::new(),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_compression: true,
            tls_verify: true,
            root_certificate_pem: None,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Disable retries.
    #[must_use]
    pub const fn without_retries(mut self) -> Self {
        self.retry_policy = RetryPolicy::no_retry();
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Trust an additional PEM-encoded root certificate.
    #[must_use]
    pub fn with_root_certificate(mut self, pem: Vec<u8>) -> Self {
        self.root_certificate_pem = Some(pem);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ServiceClientBuilder {
    service: ServiceType,
    base_url: Url,
    http_config: ClientConfig,
    user_agent: String,
    token: Option<SecretString>,
}

impl ServiceClientBuilder {
    /// Create a builder for `service` rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed.
    pub fn new(
        service: ServiceType,
        base_url: impl AsRef<str>,
        default_timeout: Duration,
    ) -> Result<Self> {
        let url = Url::parse(base_url.as_ref()).map_err(|err| {
            Error::ConfigError(format!(
                "Invalid {service} base URL `{}`: {err}",
                base_url.as_ref()
            ))
        })?;

        Ok(Self {
            service,
            base_url: with_trailing_slash(url),
            http_config: ClientConfig::new().with_timeout(default_timeout),
            user_agent: concat!("ostack/", env!("CARGO_PKG_VERSION")).to_string(),
            token: None,
        })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.http_config.retry_policy = retry;
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Configure the `X-Auth-Token` header.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn build(self) -> Result<ServiceClient> {
        let config = &self.http_config;
        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(self.user_agent.as_str())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT));

        if !config.enable_compression {
            builder = builder.no_gzip();
        }
        if !config.tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(pem) = &config.root_certificate_pem {
            let certificate = Certificate::from_pem(pem).map_err(|err| {
                Error::ConfigError(format!("Invalid CA certificate: {err}"))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        let http = builder.build().map_err(|err| {
            Error::ConfigError(format!(
                "Failed to build {} HTTP client: {err}",
                self.service
            ))
        })?;

        Ok(ServiceClient {
            http,
            service: self.service,
            base_url: self.base_url,
            retry_policy: self.http_config.retry_policy,
            token: self.token,
        })
    }
}

/// Asynchronous request executor for one OpenStack service endpoint.
///
/// Requests with idempotent methods (GET, PUT, DELETE, HEAD) are retried on
/// transient failures according to the retry policy. POST requests, and
/// anything sent through [`ServiceClient::send_json_once`], are sent exactly
/// once.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    service: ServiceType,
    base_url: Url,
    retry_policy: RetryPolicy,
    token: Option<SecretString>,
}

impl ServiceClient {
    /// Access the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The service this client talks to.
    #[must_use]
    pub const fn service(&self) -> ServiceType {
        self.service
    }

    /// The retry policy applied to idempotent requests.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    fn retries_for(&self, method: &Method) -> u32 {
        if is_idempotent(method) {
            self.retry_policy.max_retries
        } else {
            0
        }
    }

    /// Resolve a path relative to the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined URL is invalid.
    pub fn build_url(&self, path: &str) -> Result<Url> {
        let normalized = path.strip_prefix('/').unwrap_or(path);
        self.base_url.join(normalized).map_err(|err| {
            Error::InvalidEndpoint(format!("Invalid {} path `{path}`: {err}", self.service))
        })
    }

    /// Send a request, retrying transient failures, and return the raw
    /// successful response.
    ///
    /// `customize` is applied to the request on every attempt; `map_status`
    /// converts non-success statuses into errors.
    ///
    /// # Errors
    ///
    /// Returns the mapped error for non-success statuses, or the transport
    /// error once retries are exhausted.
    pub async fn execute_with_retry<F>(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        customize: F,
        map_status: StatusMapper,
    ) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let max_retries = self.retries_for(&method);
        self.execute(method, path, params, customize, map_status, max_retries).await
    }

    async fn execute<F>(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        customize: F,
        map_status: StatusMapper,
        max_retries: u32,
    ) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            let url = self.build_url(path)?;
            let mut request = self.http.request(method.clone(), url).query(params);
            if let Some(token) = &self.token {
                request = request.header(AUTH_TOKEN_HEADER, token.expose_secret());
            }
            request = customize(request);

            debug!(service = %self.service, %method, path, attempt, "sending request");

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let text = response.text().await.unwrap_or_default();
                    map_status(self.service, status, fault_message(&text))
                }
                Err(err) => Error::from(err),
            };

            if !error.is_transient() {
                return Err(error);
            }

            attempt += 1;
            if attempt > max_retries {
                return Err(error);
            }
            let delay = self.retry_policy.delay_for_attempt(attempt);
            warn!(
                service = %self.service,
                path,
                attempt,
                ?delay,
                error = %error,
                "retrying request"
            );
            sleep(delay).await;
        }
    }

    /// Send a request with an optional JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn send_json<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(&'static str, String)],
    ) -> Result<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let max_retries = self.retries_for(&method);
        self.send_json_with(method, path, body, params, max_retries).await
    }

    /// Send a JSON request exactly once, whatever the method.
    ///
    /// For action calls such as Neutron's `add_router_interface` that are
    /// sent as PUT but change state on every call.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn send_json_once<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(&'static str, String)],
    ) -> Result<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        self.send_json_with(method, path, body, params, 0).await
    }

    async fn send_json_with<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(&'static str, String)],
        max_retries: u32,
    ) -> Result<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .execute(
                method,
                path,
                params,
                |mut request| {
                    request = request.header(ACCEPT, "application/json");
                    if let Some(payload) = body {
                        request = request.json(payload);
                    }
                    request
                },
                default_status_error,
                max_retries,
            )
            .await?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| {
            Error::HttpError(format!(
                "Failed to read {} response body: {err}",
                self.service
            ))
        })?;
        deserialize_body(self.service, path, status, &bytes)
    }

    /// GET a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn get_json<R>(&self, path: &str, params: &[(&'static str, String)]) -> Result<R>
    where
        R: DeserializeOwned,
    {
        self.send_json::<(), R>(Method::GET, path, None, params).await
    }

    /// Send a request whose response body is irrelevant.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send_empty(&self, method: Method, path: &str) -> Result<()> {
        self.execute_with_retry(
            method,
            path,
            &[],
            |request| request.header(ACCEPT, "application/json"),
            default_status_error,
        )
        .await
        .map(|_| ())
    }
}

/// Status mapping shared by the Nova, Neutron and Glance clients.
#[must_use]
pub fn default_status_error(service: ServiceType, status: StatusCode, message: String) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(format!("{service}: {message}")),
        StatusCode::CONFLICT => Error::Conflict(format!("{service}: {message}")),
        StatusCode::BAD_REQUEST => Error::BadRequest(format!("{service}: {message}")),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::AuthenticationFailed(format!("{service} rejected the request: {message}"))
        }
        StatusCode::PAYLOAD_TOO_LARGE => Error::QuotaExceeded(format!("{service}: {message}")),
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            Error::ServiceUnavailable(format!("{service} temporarily unavailable: {message}"))
        }
        status if status.is_server_error() => {
            Error::ServiceUnavailable(format!("{service} server error {status}: {message}"))
        }
        _ => Error::HttpError(format!("{service} error {status}: {message}")),
    }
}

/// Extract the human-readable message from an OpenStack fault body.
///
/// Nova wraps faults as `{"itemNotFound": {"message": ..}}`, Neutron as
/// `{"NeutronError": {"message": ..}}` and Keystone as `{"error": {"message": ..}}`.
/// Bodies that match none of these are returned trimmed.
#[must_use]
pub fn fault_message(body: &str) -> String {
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body)
    else {
        return body.trim().to_string();
    };

    map.values()
        .find_map(|value| value.get("message").and_then(serde_json::Value::as_str))
        .or_else(|| map.get("message").and_then(serde_json::Value::as_str))
        .map_or_else(|| body.trim().to_string(), str::to_string)
}

/// Append `version` to the endpoint path unless it already ends with it.
///
/// Catalog entries for Neutron and Glance usually omit the API version while
/// some deployments include it.
///
/// # Errors
///
/// Returns an error if the resulting URL is invalid.
pub fn versioned_endpoint(endpoint: &Url, version: &str) -> Result<Url> {
    let base = with_trailing_slash(endpoint.clone());
    let has_version = base
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .is_some_and(|last| last == version);

    if has_version {
        Ok(base)
    } else {
        Ok(base.join(&format!("{version}/"))?)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE
    )
}

fn deserialize_body<R>(
    service: ServiceType,
    path: &str,
    status: StatusCode,
    bytes: &[u8],
) -> Result<R>
where
    R: DeserializeOwned,
{
    if status == StatusCode::NO_CONTENT || bytes.is_empty() {
        serde_json::from_value(serde_json::Value::Null).map_err(|err| {
            Error::ParseError(format!(
                "Failed to parse empty {service} response for `{path}`: {err}"
            ))
        })
    } else {
        serde_json::from_slice(bytes).map_err(|err| {
            Error::ParseError(format!(
                "Failed to parse {service} response for `{path}`: {err}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(2)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    fn client(server: &MockServer) -> ServiceClient {
        ServiceClientBuilder::new(
            ServiceType::Network,
            format!("{}/network", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_retry_policy(fast_retry())
        .with_token(SecretString::from("tok-123"))
        .build()
        .unwrap()
    }

    #[test]
    fn test_retry_policy_new() {
        let policy = RetryPolicy::new();
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(
            policy.initial_delay,
            Duration::from_millis(DEFAULT_RETRY_DELAY_MS)
        );
        assert_eq!(policy.backoff_multiplier, 2);
        assert!(policy.has_retries());
        assert!(!RetryPolicy::no_retry().has_retries());
    }

    #[test]
    fn test_retry_policy_delay_calculation() {
        let policy = RetryPolicy::new();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(4000));
        // capped at max_delay
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(5000));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(5000));
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_retry_policy(RetryPolicy::no_retry())
            .with_pool_idle_timeout(Duration::from_secs(120))
            .with_pool_max_idle(20)
            .with_compression(false)
            .with_tls_verify(false);

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry_policy.max_retries, 0);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert!(!config.enable_compression);
        assert!(!config.tls_verify);
        assert_eq!(ClientConfig::new().without_retries().retry_policy.max_retries, 0);
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = ServiceClientBuilder::new(
            ServiceType::Compute,
            "http://nova.local:8774/v2.1",
            Duration::from_secs(1),
        )
        .unwrap()
        .build()
        .unwrap();
        assert_eq!(client.base_url().as_str(), "http://nova.local:8774/v2.1/");
        assert_eq!(
            client.build_url("/servers/detail").unwrap().as_str(),
            "http://nova.local:8774/v2.1/servers/detail"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ServiceClientBuilder::new(ServiceType::Image, "::nope", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_versioned_endpoint() {
        let plain = Url::parse("http://neutron.local:9696").unwrap();
        assert_eq!(
            versioned_endpoint(&plain, "v2.0").unwrap().as_str(),
            "http://neutron.local:9696/v2.0/"
        );

        let already = Url::parse("http://neutron.local:9696/v2.0").unwrap();
        assert_eq!(
            versioned_endpoint(&already, "v2.0").unwrap().as_str(),
            "http://neutron.local:9696/v2.0/"
        );

        let prefixed = Url::parse("https://cloud.example/image/").unwrap();
        assert_eq!(
            versioned_endpoint(&prefixed, "v2").unwrap().as_str(),
            "https://cloud.example/image/v2/"
        );
    }

    #[test]
    fn test_fault_message_shapes() {
        assert_eq!(
            fault_message(r#"{"itemNotFound": {"message": "Flavor nano could not be found.", "code": 404}}"#),
            "Flavor nano could not be found."
        );
        assert_eq!(
            fault_message(r#"{"NeutronError": {"type": "NetworkNotFound", "message": "Network x could not be found.", "detail": ""}}"#),
            "Network x could not be found."
        );
        assert_eq!(
            fault_message(r#"{"error": {"code": 401, "message": "The request you have made requires authentication.", "title": "Unauthorized"}}"#),
            "The request you have made requires authentication."
        );
        assert_eq!(fault_message("  plain failure \n"), "plain failure");
    }

    #[test]
    fn test_default_status_error_mapping() {
        let map = |status| default_status_error(ServiceType::Compute, status, "m".into());
        assert!(matches!(map(StatusCode::NOT_FOUND), Error::NotFound(_)));
        assert!(matches!(map(StatusCode::CONFLICT), Error::Conflict(_)));
        assert!(matches!(map(StatusCode::UNAUTHORIZED), Error::AuthenticationFailed(_)));
        assert!(matches!(map(StatusCode::PAYLOAD_TOO_LARGE), Error::QuotaExceeded(_)));
        assert!(matches!(map(StatusCode::SERVICE_UNAVAILABLE), Error::ServiceUnavailable(_)));
        assert!(matches!(map(StatusCode::INTERNAL_SERVER_ERROR), Error::ServiceUnavailable(_)));
        assert!(matches!(map(StatusCode::IM_A_TEAPOT), Error::HttpError(_)));
    }

    #[tokio::test]
    async fn get_sends_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/network/networks"))
            .and(header("X-Auth-Token", "tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
            .expect(1)
            .mount(&server)
            .await;

        let value: serde_json::Value = client(&server).get_json("networks", &[]).await.unwrap();
        assert_eq!(value, json!({"networks": []}));
    }

    #[tokio::test]
    async fn get_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/network/routers"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/network/routers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"routers": []})))
            .mount(&server)
            .await;

        let value: serde_json::Value = client(&server).get_json("routers", &[]).await.unwrap();
        assert_eq!(value["routers"], json!([]));
    }

    #[tokio::test]
    async fn post_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/network/networks"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .send_json::<_, serde_json::Value>(
                Method::POST,
                "networks",
                Some(&json!({"network": {"name": "Net21"}})),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn send_json_once_does_not_retry_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/network/routers/r1/add_router_interface"))
            .respond_with(ResponseTemplate::new(504))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .send_json_once::<_, serde_json::Value>(
                Method::PUT,
                "routers/r1/add_router_interface",
                Some(&json!({"subnet_id": "s1"})),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn not_found_carries_fault_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/network/networks/abc"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "NeutronError": {"type": "NetworkNotFound", "message": "Network abc could not be found.", "detail": ""}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_json::<serde_json::Value>("networks/abc", &[])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::NotFound("network: Network abc could not be found.".to_string())
        );
    }

    #[tokio::test]
    async fn send_empty_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/network/routers/r1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .send_empty(Method::DELETE, "routers/r1")
            .await
            .unwrap();
    }
}
