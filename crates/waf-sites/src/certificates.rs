//! Custom certificates.
//!
//! There is no dedicated read endpoint; the certificate is part of the site
//! status, fetched under its own endpoint name so that an unknown site reads
//! as not-found.

use crate::client::site_params;
use crate::models::{CertificateUpload, CustomCertificate, SiteStatus};
use crate::Result;
use tracing::info;
use waf_core::{ApiClient, Endpoint, Request, RequestOptions, SiteId};

pub(crate) const CERTIFICATE_UPLOAD: &str = "certificate.upload";
pub(crate) const CERTIFICATE_READ: &str = "certificate.read";
pub(crate) const CERTIFICATE_DELETE: &str = "certificate.delete";

/// Custom certificate operations.
#[derive(Debug, Clone)]
pub struct CertificatesClient {
    api: ApiClient,
    options: RequestOptions,
}

impl CertificatesClient {
    pub(crate) const fn new(api: ApiClient, options: RequestOptions) -> Self {
        Self { api, options }
    }

    /// Upload or replace the custom certificate of a site.
    ///
    /// # Errors
    ///
    /// Returns any classified failure.
    pub async fn upload_certificate(&self, site_id: SiteId, upload: &CertificateUpload) -> Result<()> {
        let request = Request::form(
            Endpoint::legacy(CERTIFICATE_UPLOAD, "sites/customCertificate/upload"),
            upload.to_params(site_id),
        );
        self.api.call(request, &self.options).await?;
        info!(%site_id, "Custom certificate uploaded");
        Ok(())
    }

    /// Read the custom certificate of a site; `None` when the site has none.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::NotFound`] for unknown sites.
    pub async fn get_certificate(&self, site_id: SiteId) -> Result<Option<CustomCertificate>> {
        let request = Request::form(
            Endpoint::legacy(CERTIFICATE_READ, "sites/status"),
            site_params(site_id),
        );
        let status: SiteStatus = self.api.call_payload(request, &self.options).await?;
        Ok(status.ssl.custom_certificate)
    }

    /// Remove the custom certificate. Removing from an unknown site succeeds.
    ///
    /// # Errors
    ///
    /// Returns any classified failure other than not-found.
    pub async fn delete_certificate(&self, site_id: SiteId) -> Result<()> {
        let request = Request::form(
            Endpoint::legacy(CERTIFICATE_DELETE, "sites/customCertificate/remove"),
            site_params(site_id),
        );
        self.api
            .call_absent_ok(request, &self.options)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waf_core::{Error, RetryBudget, WafClientConfig};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> CertificatesClient {
        let config = WafClientConfig::new("12345", "secret")
            .unwrap()
            .with_all_base_urls(&server.uri());
        crate::SitesClientBuilder::new(config)
            .with_retry_budget(RetryBudget::no_retry())
            .build()
            .unwrap()
            .certificates()
    }

    #[tokio::test]
    async fn upload_certificate_sends_key_material() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/customCertificate/upload"))
            .and(body_string_contains("certificate=Y2VydA"))
            .and(body_string_contains("private_key=a2V5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"res": 0})))
            .expect(1)
            .mount(&server)
            .await;

        let upload = CertificateUpload::new("Y2VydA").with_private_key("a2V5");
        test_client(&server)
            .upload_certificate(SiteId::new(42), &upload)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_certificate_reads_site_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": "0",
                "site_id": 42,
                "ssl": {
                    "custom_certificate": {
                        "active": true,
                        "expirationDate": 1_767_225_600_000_i64,
                        "inputHash": "abc123"
                    }
                }
            })))
            .mount(&server)
            .await;

        let cert = test_client(&server)
            .get_certificate(SiteId::new(42))
            .await
            .unwrap()
            .unwrap();
        assert!(cert.active);
        assert_eq!(cert.input_hash.as_deref(), Some("abc123"));
        assert_eq!(
            cert.expiration_date.unwrap().timestamp_millis(),
            1_767_225_600_000
        );
    }

    #[tokio::test]
    async fn get_certificate_without_certificate_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": 0,
                "site_id": 42
            })))
            .mount(&server)
            .await;

        let cert = test_client(&server)
            .get_certificate(SiteId::new(42))
            .await
            .unwrap();
        assert!(cert.is_none());
    }

    #[tokio::test]
    async fn get_certificate_unknown_site_is_not_found() {
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
            .get_certificate(SiteId::new(42))
            .await
            .unwrap_err();
        match err {
            Error::NotFound(failure) => assert_eq!(failure.endpoint, CERTIFICATE_READ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_certificate_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/customCertificate/remove"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": "9403",
                "res_message": "Unknown/unauthorized site_id"
            })))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server)
            .delete_certificate(SiteId::new(42))
            .await
            .unwrap();
    }
}
