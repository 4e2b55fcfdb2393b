//! Asynchronous client for site provisioning.

use crate::cache_rules::CacheRulesClient;
use crate::certificates::CertificatesClient;
use crate::data_centers::DataCentersClient;
use crate::delivery_rules::DeliveryRulesClient;
use crate::models::{ListSitesParams, NewSite, SiteList, SiteStatus};
use crate::Result;
use std::sync::Arc;
use tracing::info;
use waf_core::{
    ApiClient, ApiClientBuilder, ClientConfig, Endpoint, FormParams, Request, RequestOptions,
    RetryBudget, SentinelKind, SiteId, Transport, WafClientConfig,
};

const USER_AGENT: &str = concat!("waf-sites/", env!("CARGO_PKG_VERSION"));

pub(crate) const SITE_ADD: &str = "site.add";
pub(crate) const SITE_STATUS: &str = "site.status";
pub(crate) const SITE_DELETE: &str = "site.delete";
pub(crate) const SITE_LIST: &str = "site.list";

/// Builder for [`SitesClient`].
#[derive(Debug)]
pub struct SitesClientBuilder {
    inner: ApiClientBuilder,
}

impl SitesClientBuilder {
    /// Create a builder from a client configuration.
    #[must_use]
    pub fn new(config: WafClientConfig) -> Self {
        Self {
            inner: ApiClientBuilder::new(config).with_user_agent(USER_AGENT),
        }
    }

    /// Override the default retry budget.
    #[must_use]
    pub fn with_retry_budget(mut self, budget: RetryBudget) -> Self {
        self.inner = self.inner.with_retry_budget(budget);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.inner = self.inner.with_http_config(config);
        self
    }

    /// Register an extra endpoint-specific result code.
    #[must_use]
    pub fn with_sentinel(mut self, endpoint: &str, code: i64, kind: SentinelKind) -> Self {
        self.inner = self.inner.with_sentinel(endpoint, code, kind);
        self
    }

    /// Use a custom transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.inner = self.inner.with_transport(transport);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<SitesClient> {
        let api = self.inner.build()?;
        Ok(SitesClient::from_api(api))
    }
}

/// Asynchronous client for sites and their sub-resources.
#[derive(Debug, Clone)]
pub struct SitesClient {
    api: ApiClient,
    options: RequestOptions,
}

impl SitesClient {
    /// Construct a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WafClientConfig) -> Result<Self> {
        SitesClientBuilder::new(config).build()
    }

    /// Wrap an existing core client.
    #[must_use]
    pub fn from_api(api: ApiClient) -> Self {
        Self {
            api,
            options: RequestOptions::default(),
        }
    }

    /// Copy of this client using `options` for every call.
    #[must_use]
    pub fn with_options(&self, options: RequestOptions) -> Self {
        Self {
            api: self.api.clone(),
            options,
        }
    }

    /// The underlying core client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Data centers and origin servers.
    #[must_use]
    pub fn data_centers(&self) -> DataCentersClient {
        DataCentersClient::new(self.api.clone(), self.options.clone())
    }

    /// Caching rules.
    #[must_use]
    pub fn cache_rules(&self) -> CacheRulesClient {
        CacheRulesClient::new(self.api.clone(), self.options.clone())
    }

    /// Custom certificates.
    #[must_use]
    pub fn certificates(&self) -> CertificatesClient {
        CertificatesClient::new(self.api.clone(), self.options.clone())
    }

    /// Delivery rules (v3 API).
    #[must_use]
    pub fn delivery_rules(&self) -> DeliveryRulesClient {
        DeliveryRulesClient::new(self.api.clone(), self.options.clone())
    }

    /// Create a site.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::Conflict`] if the domain is already
    /// onboarded, or any other classified failure.
    pub async fn add_site(&self, site: &NewSite) -> Result<SiteStatus> {
        let request = Request::form(Endpoint::legacy(SITE_ADD, "sites/add"), site.to_params());
        let status: SiteStatus = self.api.call_payload(request, &self.options).await?;
        info!(site_id = %status.site_id, domain = %site.domain, "Site created");
        Ok(status)
    }

    /// Fetch the status of a site.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::NotFound`] for unknown sites.
    pub async fn get_site_status(&self, site_id: SiteId) -> Result<SiteStatus> {
        let request = Request::form(
            Endpoint::legacy(SITE_STATUS, "sites/status"),
            site_params(site_id),
        );
        self.api.call_payload(request, &self.options).await
    }

    /// Delete a site. Deleting an unknown site succeeds.
    ///
    /// # Errors
    ///
    /// Returns any classified failure other than not-found.
    pub async fn delete_site(&self, site_id: SiteId) -> Result<()> {
        let request = Request::form(
            Endpoint::legacy(SITE_DELETE, "sites/delete"),
            site_params(site_id),
        );
        if self
            .api
            .call_absent_ok(request, &self.options)
            .await?
            .is_none()
        {
            info!(%site_id, "Site already deleted");
        }
        Ok(())
    }

    /// List one page of sites.
    ///
    /// # Errors
    ///
    /// Returns any classified failure.
    pub async fn list_sites(&self, params: &ListSitesParams) -> Result<Vec<SiteStatus>> {
        let request = Request::form(Endpoint::legacy(SITE_LIST, "sites/list"), params.to_params());
        let list: SiteList = self.api.call_payload(request, &self.options).await?;
        Ok(list.sites)
    }
}

pub(crate) fn site_params(site_id: SiteId) -> FormParams {
    let mut params = FormParams::new();
    params.push("site_id", site_id);
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waf_core::{AccountId, Error};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> SitesClient {
        let config = WafClientConfig::new("12345", "secret")
            .unwrap()
            .with_all_base_urls(&server.uri());
        SitesClientBuilder::new(config)
            .with_retry_budget(RetryBudget::no_retry())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn add_site_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/add"))
            .and(body_string_contains("domain=www.example.com"))
            .and(body_string_contains("account_id=10"))
            .and(body_string_contains("api_key=secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": 0,
                "res_message": "OK",
                "site_id": 123456,
                "status": "pending-dns-changes",
                "domain": "www.example.com",
                "account_id": 10,
                "site_creation_date": 1_700_000_000_000_i64,
                "ips": ["192.0.2.10"],
                "dns": [
                    {"dns_record_name": "www.example.com", "set_type_to": "CNAME", "set_data_to": ["abc.x.incapdns.net"]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut site = NewSite::new("www.example.com");
        site.account_id = Some(AccountId::new(10));
        let status = test_client(&server).add_site(&site).await.unwrap();

        assert_eq!(status.site_id, SiteId::new(123_456));
        assert_eq!(status.status.as_deref(), Some("pending-dns-changes"));
        assert_eq!(status.dns[0].set_type_to.as_deref(), Some("CNAME"));
        assert!(status.site_creation_date.is_some());
    }

    #[tokio::test]
    async fn add_site_duplicate_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/add"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": "1",
                "res_message": "Site with this domain already exists"
            })))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .add_site(&NewSite::new("www.example.com"))
            .await
            .unwrap_err();
        match err {
            Error::Conflict(failure) => {
                assert_eq!(failure.endpoint, SITE_ADD);
                assert_eq!(failure.result_code, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_site_status_unknown_site_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": 9403,
                "res_message": "Unknown/unauthorized site_id"
            })))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .get_site_status(SiteId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_site_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/delete"))
            .and(body_string_contains("site_id=55"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": "9403",
                "res_message": "Unknown/unauthorized site_id"
            })))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server)
            .delete_site(SiteId::new(55))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_sites_with_paging() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/list"))
            .and(body_string_contains("page_size=2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": 0,
                "sites": [
                    {"site_id": "1", "domain": "a.example.com"},
                    {"site_id": 2, "domain": "b.example.com", "active": "bypass"}
                ]
            })))
            .mount(&server)
            .await;

        let params = ListSitesParams {
            page_size: Some(2),
            ..ListSitesParams::default()
        };
        let sites = test_client(&server).list_sites(&params).await.unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[1].active.as_deref(), Some("bypass"));
    }

    #[tokio::test]
    async fn server_errors_surface_as_permanent_without_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/status"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server)
            .get_site_status(SiteId::new(1))
            .await
            .unwrap_err();
        match err {
            Error::Permanent(failure) => {
                assert!(failure.retries_exhausted);
                assert_eq!(failure.http_status, Some(503));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
