//! The request pipeline shared by every resource adapter.
//!
//! [`ApiClient::execute`] runs transport, decoder and classifier for one
//! request under the retry policy and returns the classified [`Outcome`].
//! Adapters normally use the typed helpers ([`ApiClient::call_payload`],
//! [`ApiClient::call_data`], [`ApiClient::call_absent_ok`]).

use crate::classify::{Classifier, Outcome, SentinelKind, SentinelTable};
use crate::config::WafClientConfig;
use crate::credentials::Credentials;
use crate::decode::{decode, DecodedBody};
use crate::error::{Error, Result};
use crate::retry::{with_retry, OperationContext, RetryBudget};
use crate::transport::{HttpTransport, Request, Transport};
use reqwest::ClientBuilder;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

const USER_AGENT: &str = concat!("waf-core/", env!("CARGO_PKG_VERSION"));

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Default TCP connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// HTTP connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Enable response compression
    pub enable_compression: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            enable_compression: true,
        }
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

    /// Set TCP connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-operation overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Per-attempt timeout; the client default when `None`
    pub timeout: Option<Duration>,
    /// Retry budget; the client default when `None`
    pub retry: Option<RetryBudget>,
    /// Deadline and cancellation for the whole operation
    pub context: OperationContext,
}

impl RequestOptions {
    /// No overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry budget.
    #[must_use]
    pub fn with_retry(mut self, budget: RetryBudget) -> Self {
        self.retry = Some(budget);
        self
    }

    /// Make a single attempt.
    #[must_use]
    pub fn without_retries(self) -> Self {
        self.with_retry(RetryBudget::no_retry())
    }

    /// Give up at `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.context = self.context.with_deadline(deadline);
        self
    }

    /// Give up when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.context = self.context.with_cancellation(token);
        self
    }

    /// Replace the whole operation context.
    #[must_use]
    pub fn with_context(mut self, context: OperationContext) -> Self {
        self.context = context;
        self
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    config: WafClientConfig,
    http_config: ClientConfig,
    sentinels: SentinelTable,
    retry: Option<RetryBudget>,
    transport: Option<Arc<dyn Transport>>,
    user_agent: String,
}

impl ApiClientBuilder {
    /// Create a builder from a client configuration.
    #[must_use]
    pub fn new(config: WafClientConfig) -> Self {
        Self {
            config,
            http_config: ClientConfig::default(),
            sentinels: SentinelTable::with_defaults(),
            retry: None,
            transport: None,
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Override the HTTP connection settings.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Replace the sentinel table.
    #[must_use]
    pub fn with_sentinels(mut self, sentinels: SentinelTable) -> Self {
        self.sentinels = sentinels;
        self
    }

    /// Add one endpoint-specific sentinel to the table.
    #[must_use]
    pub fn with_sentinel(
        mut self,
        endpoint: impl Into<String>,
        code: i64,
        kind: SentinelKind,
    ) -> Self {
        self.sentinels = self.sentinels.with_sentinel(endpoint, code, kind);
        self
    }

    /// Override the default retry budget.
    #[must_use]
    pub fn with_retry_budget(mut self, budget: RetryBudget) -> Self {
        self.retry = Some(budget);
        self
    }

    /// Use a custom transport instead of the reqwest one.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Override the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Finalise the builder and create the [`ApiClient`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn build(self) -> Result<ApiClient> {
        self.config.check()?;
        let credentials = self.config.credentials()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let http = build_http_client(&self.config, &self.http_config, &self.user_agent)?;
                Arc::new(HttpTransport::new(http, self.config.base_urls()?))
            }
        };

        Ok(ApiClient {
            transport,
            credentials: Arc::new(credentials),
            classifier: Arc::new(Classifier::new(self.sentinels)),
            retry: self
                .retry
                .unwrap_or_else(|| self.config.retry_budget()),
            timeout: self.config.timeout(),
        })
    }
}

impl fmt::Debug for ApiClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClientBuilder")
            .field("config", &self.config)
            .field("http_config", &self.http_config)
            .field("retry", &self.retry)
            .field("custom_transport", &self.transport.is_some())
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

fn build_http_client(
    config: &WafClientConfig,
    http_config: &ClientConfig,
    user_agent: &str,
) -> Result<reqwest::Client> {
    let mut builder = ClientBuilder::new()
        .user_agent(user_agent)
        .timeout(config.timeout())
        .pool_idle_timeout(http_config.pool_idle_timeout)
        .pool_max_idle_per_host(http_config.pool_max_idle_per_host)
        .connect_timeout(http_config.connect_timeout)
        .gzip(http_config.enable_compression);

    if !config.tls_verify {
        warn!("TLS verification disabled for WAF API client");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))
}

/// Authenticated client for every API generation.
///
/// Cheap to clone; clones share the connection pool, credentials and
/// sentinel table.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<Credentials>,
    classifier: Arc<Classifier>,
    retry: RetryBudget,
    timeout: Duration,
}

impl ApiClient {
    /// Construct a client with default settings.
    ///
    /// # Errors
    ///
    /// See [`ApiClientBuilder::build`].
    pub fn new(config: WafClientConfig) -> Result<Self> {
        ApiClientBuilder::new(config).build()
    }

    /// Start a builder.
    #[must_use]
    pub fn builder(config: WafClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Default retry budget.
    #[must_use]
    pub const fn retry_budget(&self) -> &RetryBudget {
        &self.retry
    }

    /// Default per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The classifier in use.
    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Run `request` to a classified outcome, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid requests, decode failures, an expired
    /// deadline, or a connectivity error when retries are not possible.
    /// Classified failures come back as `Ok(Outcome::…)`.
    pub async fn execute(&self, request: Request, options: &RequestOptions) -> Result<Outcome> {
        let operation_id = Uuid::new_v4().to_string();
        let endpoint = request.endpoint.name();
        let span = info_span!("waf_request", endpoint, operation_id = %operation_id);

        async move {
            let mut request = request;
            if request.timeout.is_none() {
                request.timeout = Some(options.timeout.unwrap_or(self.timeout));
            }
            request.validate()?;

            let budget = options.retry.as_ref().unwrap_or(&self.retry);
            let request = &request;
            let this = self;
            let outcome = with_retry(budget, &options.context, endpoint, move |attempt| {
                debug!(attempt, "Sending request");
                this.attempt(request)
            })
            .await?
            .with_operation_id(&operation_id);

            match &outcome {
                Outcome::Success(_) => info!("Request succeeded"),
                other => {
                    if let Some(failure) = other.failure() {
                        info!(verdict = ?other.verdict(), %failure, "Request failed");
                    }
                }
            }
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Run `request` and require success.
    ///
    /// # Errors
    ///
    /// Every non-success outcome is returned as the matching [`Error`].
    pub async fn call(&self, request: Request, options: &RequestOptions) -> Result<DecodedBody> {
        self.execute(request, options).await?.into_result()
    }

    /// Run `request`, treating an absent resource as `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Every other non-success outcome is returned as the matching [`Error`].
    pub async fn call_absent_ok(
        &self,
        request: Request,
        options: &RequestOptions,
    ) -> Result<Option<DecodedBody>> {
        self.execute(request, options).await?.absent_ok()
    }

    /// Run `request` and deserialize the whole success body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`]; also [`Error::Decode`] on a shape mismatch.
    pub async fn call_payload<T>(&self, request: Request, options: &RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let endpoint = request.endpoint.name();
        self.call(request, options).await?.into_payload(endpoint)
    }

    /// Run `request` and deserialize the `data`/`value` envelope.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call_payload`].
    pub async fn call_data<T>(&self, request: Request, options: &RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let endpoint = request.endpoint.name();
        self.call(request, options).await?.into_data(endpoint)
    }

    async fn attempt(&self, request: &Request) -> Result<Outcome> {
        let raw = self.transport.execute(request, &self.credentials).await?;
        let decoded = decode(&raw, &request.endpoint)?;
        Ok(self.classifier.classify(&request.endpoint, &raw, decoded))
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("credentials", &self.credentials)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
