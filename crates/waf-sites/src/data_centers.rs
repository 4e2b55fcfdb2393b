//! Data centers and their origin servers.

use crate::client::site_params;
use crate::models::{
    AddedDataCenter, AddedServer, DataCenter, DataCenterList, DataCenterUpdate, NewDataCenter,
    NewServer, ServerUpdate,
};
use crate::Result;
use tracing::{debug, info};
use waf_core::{
    ApiClient, DataCenterId, Endpoint, FormParams, Request, RequestOptions, ServerId, SiteId,
};

pub(crate) const DATA_CENTER_ADD: &str = "data_center.add";
pub(crate) const DATA_CENTER_LIST: &str = "data_center.list";
pub(crate) const DATA_CENTER_EDIT: &str = "data_center.edit";
pub(crate) const DATA_CENTER_DELETE: &str = "data_center.delete";
pub(crate) const SERVER_ADD: &str = "data_center_server.add";
pub(crate) const SERVER_EDIT: &str = "data_center_server.edit";
pub(crate) const SERVER_DELETE: &str = "data_center_server.delete";

/// Data center operations of a site.
#[derive(Debug, Clone)]
pub struct DataCentersClient {
    api: ApiClient,
    options: RequestOptions,
}

impl DataCentersClient {
    pub(crate) const fn new(api: ApiClient, options: RequestOptions) -> Self {
        Self { api, options }
    }

    /// Create a data center with its first server.
    ///
    /// # Errors
    ///
    /// Returns any classified failure.
    pub async fn add_data_center(&self, data_center: &NewDataCenter) -> Result<DataCenterId> {
        let request = Request::form(
            Endpoint::legacy(DATA_CENTER_ADD, "sites/dataCenters/add"),
            data_center.to_params(),
        );
        let added: AddedDataCenter = self.api.call_payload(request, &self.options).await?;
        info!(dc_id = %added.datacenter_id, site_id = %data_center.site_id, "Data center created");
        Ok(added.datacenter_id)
    }

    /// List the data centers of a site, servers included.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::NotFound`] for unknown sites.
    pub async fn list_data_centers(&self, site_id: SiteId) -> Result<Vec<DataCenter>> {
        let request = Request::form(
            Endpoint::legacy(DATA_CENTER_LIST, "sites/dataCenters/list"),
            site_params(site_id),
        );
        let list: DataCenterList = self.api.call_payload(request, &self.options).await?;
        debug!(%site_id, count = list.data_centers.len(), "Listed data centers");
        Ok(list.data_centers)
    }

    /// Update a data center.
    ///
    /// # Errors
    ///
    /// Returns any classified failure, including not-found.
    pub async fn edit_data_center(&self, id: DataCenterId, update: &DataCenterUpdate) -> Result<()> {
        let request = Request::form(
            Endpoint::legacy(DATA_CENTER_EDIT, "sites/dataCenters/edit"),
            update.to_params(id),
        );
        self.api.call(request, &self.options).await.map(|_| ())
    }

    /// Delete a data center. Deleting an already-deleted data center succeeds.
    ///
    /// # Errors
    ///
    /// Returns any classified failure other than not-found.
    pub async fn delete_data_center(&self, id: DataCenterId) -> Result<()> {
        let mut params = FormParams::new();
        params.push("dc_id", id);
        let request = Request::form(
            Endpoint::legacy(DATA_CENTER_DELETE, "sites/dataCenters/delete"),
            params,
        );
        self.api
            .call_absent_ok(request, &self.options)
            .await
            .map(|_| ())
    }

    /// Add an origin server to a data center.
    ///
    /// # Errors
    ///
    /// Returns any classified failure.
    pub async fn add_server(&self, server: &NewServer) -> Result<ServerId> {
        let request = Request::form(
            Endpoint::legacy(SERVER_ADD, "sites/dataCenters/servers/add"),
            server.to_params(),
        );
        let added: AddedServer = self.api.call_payload(request, &self.options).await?;
        info!(server_id = %added.server_id, dc_id = %server.dc_id, "Origin server added");
        Ok(added.server_id)
    }

    /// Update an origin server.
    ///
    /// # Errors
    ///
    /// Returns any classified failure, including not-found.
    pub async fn edit_server(&self, id: ServerId, update: &ServerUpdate) -> Result<()> {
        let request = Request::form(
            Endpoint::legacy(SERVER_EDIT, "sites/dataCenters/servers/edit"),
            update.to_params(id),
        );
        self.api.call(request, &self.options).await.map(|_| ())
    }

    /// Delete an origin server. Deleting an unknown server succeeds.
    ///
    /// # Errors
    ///
    /// Returns any classified failure other than not-found.
    pub async fn delete_server(&self, id: ServerId) -> Result<()> {
        let mut params = FormParams::new();
        params.push("server_id", id);
        let request = Request::form(
            Endpoint::legacy(SERVER_DELETE, "sites/dataCenters/servers/delete"),
            params,
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
    use crate::SitesClient;
    use serde_json::json;
    use std::time::Duration;
    use waf_core::{Backoff, Error, RetryBudget, WafClientConfig};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> DataCentersClient {
        let config = WafClientConfig::new("12345", "secret")
            .unwrap()
            .with_all_base_urls(&server.uri());
        crate::SitesClientBuilder::new(config)
            .with_retry_budget(
                RetryBudget::new()
                    .with_max_attempts(3)
                    .with_backoff(Backoff::Constant(Duration::from_millis(5))),
            )
            .build()
            .unwrap()
            .data_centers()
    }

    #[tokio::test]
    async fn add_data_center_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/dataCenters/add"))
            .and(body_string_contains("site_id=42"))
            .and(body_string_contains("name=primary"))
            .and(body_string_contains("is_content=false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": "0",
                "datacenter_id": "9001"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = test_client(&server)
            .add_data_center(&NewDataCenter {
                site_id: SiteId::new(42),
                name: "primary".to_string(),
                server_address: "192.0.2.1".to_string(),
                is_content: Some(false),
                is_enabled: None,
            })
            .await
            .unwrap();
        assert_eq!(id, DataCenterId::new(9001));
    }

    #[tokio::test]
    async fn list_data_centers_includes_servers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/dataCenters/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": 0,
                "DCs": [{
                    "id": "9001",
                    "name": "primary",
                    "enabled": "true",
                    "servers": [
                        {"id": "1", "address": "192.0.2.1", "isEnabled": "true", "isStandby": "false"},
                        {"id": "2", "address": "192.0.2.2", "isEnabled": "true", "isStandby": "true"}
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let dcs = test_client(&server)
            .list_data_centers(SiteId::new(42))
            .await
            .unwrap();
        assert_eq!(dcs.len(), 1);
        assert_eq!(dcs[0].servers.len(), 2);
        assert!(dcs[0].server(ServerId::new(2)).unwrap().is_standby);
    }

    #[tokio::test]
    async fn delete_data_center_twice_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/dataCenters/delete"))
            .and(body_string_contains("dc_id=9001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": 9413,
                "res_message": "Unknown/unauthorized data center id"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client.delete_data_center(DataCenterId::new(9001)).await.unwrap();
        client.delete_data_center(DataCenterId::new(9001)).await.unwrap();
    }

    #[tokio::test]
    async fn edit_server_rejected_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/dataCenters/servers/edit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": 2,
                "res_message": "Invalid input"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let update = ServerUpdate {
            server_address: Some("not-an-ip".to_string()),
            ..ServerUpdate::default()
        };
        let err = test_client(&server)
            .edit_server(ServerId::new(1), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Permanent(ref f) if f.message == "Invalid input"));
    }

    #[tokio::test]
    async fn add_server_retries_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/dataCenters/servers/add"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sites/dataCenters/servers/add"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "res": 0,
                "server_id": 77
            })))
            .mount(&server)
            .await;

        let id = test_client(&server)
            .add_server(&NewServer {
                dc_id: DataCenterId::new(9001),
                server_address: "192.0.2.3".to_string(),
                is_standby: Some(true),
            })
            .await
            .unwrap();
        assert_eq!(id, ServerId::new(77));
    }

    #[tokio::test]
    async fn delete_server_missing_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sites/dataCenters/servers/delete"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client: SitesClient = {
            let config = WafClientConfig::new("12345", "secret")
                .unwrap()
                .with_all_base_urls(&server.uri());
            SitesClient::new(config).unwrap()
        };
        client
            .data_centers()
            .delete_server(ServerId::new(3))
            .await
            .unwrap();
    }
}
