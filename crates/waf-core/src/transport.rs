//! HTTP transport.
//!
//! [`Transport`] is the only place that touches the network. It injects the
//! credentials in the style the endpoint's encoding requires, and always reads
//! the body to the end so the pooled connection is released, whatever the
//! status. It never retries.

use crate::credentials::{Credentials, API_ID_HEADER, API_KEY_HEADER};
use crate::endpoint::{ApiVersion, Encoding, Endpoint};
use crate::error::{Error, Result};
use crate::form::FormParams;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::Client;
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Pre-encoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No body (credentials are still sent)
    Empty,
    /// Form pairs for [`Encoding::Form`] endpoints
    Form(FormParams),
    /// JSON document for [`Encoding::Json`] endpoints
    Json(serde_json::Value),
}

/// One request: endpoint, body, query string and optional timeout override.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Target endpoint
    pub endpoint: Endpoint,
    /// Body
    pub payload: Payload,
    /// Query string pairs
    pub query: Vec<(&'static str, String)>,
    /// Per-request timeout, overriding the client default
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a request with no body.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            payload: Payload::Empty,
            query: Vec::new(),
            timeout: None,
        }
    }

    /// Create a form request.
    #[must_use]
    pub fn form(endpoint: Endpoint, params: FormParams) -> Self {
        Self::new(endpoint).with_payload(Payload::Form(params))
    }

    /// Create a JSON request.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized.
    pub fn json<B>(endpoint: Endpoint, body: &B) -> Result<Self>
    where
        B: serde::Serialize + ?Sized,
    {
        let value = serde_json::to_value(body).map_err(|err| {
            Error::InvalidRequest(format!(
                "Failed to encode `{}` body: {err}",
                endpoint.name()
            ))
        })?;
        Ok(Self::new(endpoint).with_payload(Payload::Json(value)))
    }

    /// Set the body.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Set the query string.
    #[must_use]
    pub fn with_query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check that the request can be sent.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty path or a body that does not match the
    /// endpoint's encoding.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.path().trim_matches('/').is_empty() {
            return Err(Error::InvalidEndpoint(format!(
                "`{}` has an empty path",
                self.endpoint.name()
            )));
        }

        match (&self.payload, self.endpoint.encoding()) {
            (Payload::Empty, _)
            | (Payload::Form(_), Encoding::Form)
            | (Payload::Json(_), Encoding::Json) => Ok(()),
            (Payload::Form(_), Encoding::Json) => Err(Error::InvalidRequest(format!(
                "`{}` expects a JSON body, got form pairs",
                self.endpoint.name()
            ))),
            (Payload::Json(_), Encoding::Form) => Err(Error::InvalidRequest(format!(
                "`{}` expects form pairs, got a JSON body",
                self.endpoint.name()
            ))),
        }
    }
}

/// Status code and fully read body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Body bytes
    pub body: Bytes,
}

impl RawResponse {
    /// Create a response from parts.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Executes requests against the control plane.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connectivity`] when no response was received, and
    /// request validation errors before any I/O.
    async fn execute(&self, request: &Request, credentials: &Credentials) -> Result<RawResponse>;
}

/// Base URL per API generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrls {
    legacy: Url,
    v2: Url,
    v3: Url,
}

impl BaseUrls {
    /// Parse the three base URLs.
    ///
    /// # Errors
    ///
    /// Returns an error if any URL cannot be parsed.
    pub fn new(legacy: &str, v2: &str, v3: &str) -> Result<Self> {
        Ok(Self {
            legacy: parse_base(legacy)?,
            v2: parse_base(v2)?,
            v3: parse_base(v3)?,
        })
    }

    /// Base URL for a generation.
    #[must_use]
    pub const fn for_api(&self, api: ApiVersion) -> &Url {
        match api {
            ApiVersion::Legacy => &self.legacy,
            ApiVersion::V2 => &self.v2,
            ApiVersion::V3 => &self.v3,
        }
    }

    /// Full URL of an endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined onto the base.
    pub fn resolve(&self, endpoint: &Endpoint) -> Result<Url> {
        let path = endpoint.path().trim_start_matches('/');
        self.for_api(endpoint.api()).join(path).map_err(|err| {
            Error::InvalidEndpoint(format!(
                "Invalid path `{path}` for `{}`: {err}",
                endpoint.name()
            ))
        })
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw).map_err(|err| Error::ConfigError(format!("Invalid base URL `{raw}`: {err}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_urls: BaseUrls,
}

impl HttpTransport {
    /// Wrap a configured reqwest client.
    #[must_use]
    pub fn new(http: Client, base_urls: BaseUrls) -> Self {
        Self { http, base_urls }
    }

    /// Base URLs in use.
    #[must_use]
    pub const fn base_urls(&self) -> &BaseUrls {
        &self.base_urls
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request, credentials: &Credentials) -> Result<RawResponse> {
        request.validate()?;

        let endpoint = &request.endpoint;
        let url = self.base_urls.resolve(endpoint)?;
        let mut builder = self
            .http
            .request(endpoint.method().into(), url)
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match endpoint.encoding() {
            Encoding::Form => {
                let mut form: Vec<(&str, &str)> = match &request.payload {
                    Payload::Form(params) => params
                        .pairs()
                        .iter()
                        .map(|(key, value)| (*key, value.as_str()))
                        .collect(),
                    _ => Vec::new(),
                };
                form.extend(credentials.form_pairs());
                builder.form(&form)
            }
            Encoding::Json => {
                let builder = builder
                    .header(API_ID_HEADER, credentials.api_id())
                    .header(API_KEY_HEADER, credentials.api_key().expose_secret());
                match &request.payload {
                    Payload::Json(body) => builder.json(body),
                    _ => builder,
                }
            }
        };

        debug!(endpoint = endpoint.name(), api = %endpoint.api(), "sending request");

        let response = builder.send().await.map_err(|err| {
            let error = Error::from(err);
            debug!(endpoint = endpoint.name(), %error, "request failed before a response");
            error
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|err| {
            Error::Connectivity(format!(
                "Failed to read `{}` response body: {err}",
                endpoint.name()
            ))
        })?;

        debug!(
            endpoint = endpoint.name(),
            status,
            bytes = body.len(),
            "received response"
        );

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::HttpMethod;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> HttpTransport {
        let base = server.uri();
        let urls = BaseUrls::new(
            &format!("{base}/api/prov/v1"),
            &format!("{base}/policies/v2"),
            &format!("{base}/api/prov/v3"),
        )
        .unwrap();
        HttpTransport::new(Client::new(), urls)
    }

    fn credentials() -> Credentials {
        Credentials::new("1234", "secret-key").unwrap()
    }

    #[test]
    fn base_urls_keep_their_path() {
        let urls = BaseUrls::new(
            "https://my.example.com/api/prov/v1",
            "https://api.example.com/policies/v2/",
            "https://my.example.com/api/prov/v3",
        )
        .unwrap();
        let url = urls
            .resolve(&Endpoint::legacy("site.add", "sites/add"))
            .unwrap();
        assert_eq!(url.as_str(), "https://my.example.com/api/prov/v1/sites/add");

        let url = urls
            .resolve(&Endpoint::json(
                "policy.read",
                ApiVersion::V2,
                HttpMethod::Get,
                "/policies/7",
            ))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/policies/v2/policies/7");
    }

    #[test]
    fn base_urls_reject_garbage() {
        assert!(matches!(
            BaseUrls::new("not a url", "https://a", "https://b"),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn request_validation() {
        let empty = Request::new(Endpoint::legacy("site.add", ""));
        assert!(matches!(empty.validate(), Err(Error::InvalidEndpoint(_))));

        let mismatched = Request::new(Endpoint::legacy("site.add", "sites/add"))
            .with_payload(Payload::Json(json!({})));
        assert!(matches!(mismatched.validate(), Err(Error::InvalidRequest(_))));

        let ok = Request::form(Endpoint::legacy("site.add", "sites/add"), FormParams::new());
        assert!(ok.validate().is_ok());
    }

    #[tokio::test]
    async fn form_request_embeds_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/prov/v1/sites/add"))
            .and(body_string_contains("domain=www.example.com"))
            .and(body_string_contains("api_id=1234"))
            .and(body_string_contains("api_key=secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"res":0}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut params = FormParams::new();
        params.push("domain", "www.example.com");
        let request = Request::form(Endpoint::legacy("site.add", "sites/add"), params);

        let raw = transport(&server)
            .execute(&request, &credentials())
            .await
            .unwrap();
        assert_eq!(raw.status, 200);
        assert_eq!(raw.body, Bytes::from_static(br#"{"res":0}"#));
    }

    #[tokio::test]
    async fn json_request_uses_headers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/policies/v2/policies/9"))
            .and(header("x-api-id", "1234"))
            .and(header("x-api-key", "secret-key"))
            .and(query_param("extended", "true"))
            .and(body_json(json!({"name": "block"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": {"id": 9}})))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Endpoint::json("policy.update", ApiVersion::V2, HttpMethod::Put, "policies/9");
        let request = Request::json(endpoint, &json!({"name": "block"}))
            .unwrap()
            .with_query(vec![("extended", "true".to_string())]);

        let raw = transport(&server)
            .execute(&request, &credentials())
            .await
            .unwrap();
        assert_eq!(raw.status, 200);
    }

    #[tokio::test]
    async fn non_success_status_still_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/prov/v3/sites/1/delivery-rules-configuration"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let endpoint = Endpoint::json(
            "delivery_rules.read",
            ApiVersion::V3,
            HttpMethod::Get,
            "sites/1/delivery-rules-configuration",
        );
        let raw = transport(&server)
            .execute(&Request::new(endpoint), &credentials())
            .await
            .unwrap();
        assert_eq!(raw.status, 503);
        assert_eq!(raw.body, Bytes::from_static(b"busy"));
    }

    #[tokio::test]
    async fn unreachable_host_is_connectivity_error() {
        let urls = BaseUrls::new(
            "http://127.0.0.1:1/api/prov/v1",
            "http://127.0.0.1:1/policies/v2",
            "http://127.0.0.1:1/api/prov/v3",
        )
        .unwrap();
        let transport = HttpTransport::new(Client::new(), urls);
        let request = Request::form(Endpoint::legacy("site.add", "sites/add"), FormParams::new());

        let err = transport.execute(&request, &credentials()).await.unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
    }

    #[tokio::test]
    async fn timeout_is_connectivity_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"res":0}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let request = Request::form(Endpoint::legacy("site.add", "sites/add"), FormParams::new())
            .with_timeout(Duration::from_millis(50));
        let err = transport(&server)
            .execute(&request, &credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
    }
}
