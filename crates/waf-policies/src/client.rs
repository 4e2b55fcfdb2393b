//! Asynchronous client for the v2 policy API.

use crate::models::{AssetType, NewPolicy, Policy, PolicyList, PolicyUpdate};
use crate::Result;
use std::sync::Arc;
use tracing::info;
use waf_core::{
    ApiClient, ApiClientBuilder, ApiVersion, ClientConfig, Endpoint, HttpMethod, PolicyId,
    Request, RequestOptions, RetryBudget, SentinelKind, Transport, WafClientConfig,
};

const USER_AGENT: &str = concat!("waf-policies/", env!("CARGO_PKG_VERSION"));

pub(crate) const POLICY_CREATE: &str = "policy.create";
pub(crate) const POLICY_READ: &str = "policy.read";
pub(crate) const POLICY_UPDATE: &str = "policy.update";
pub(crate) const POLICY_DELETE: &str = "policy.delete";
pub(crate) const POLICY_LIST: &str = "policy.list";
pub(crate) const POLICY_ASSET_APPLY: &str = "policy_asset.apply";
pub(crate) const POLICY_ASSET_REMOVE: &str = "policy_asset.remove";

fn policy_path(policy_id: PolicyId) -> String {
    format!("policies/{policy_id}")
}

fn asset_path(asset_type: AssetType, asset_id: u64, policy_id: PolicyId) -> String {
    format!("assets/{asset_type}/{asset_id}/policies/{policy_id}")
}

/// Builder for [`PoliciesClient`].
#[derive(Debug)]
pub struct PoliciesClientBuilder {
    inner: ApiClientBuilder,
}

impl PoliciesClientBuilder {
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
    pub fn build(self) -> Result<PoliciesClient> {
        let api = self.inner.build()?;
        Ok(PoliciesClient::from_api(api))
    }
}

/// Asynchronous client for policies and their asset associations.
#[derive(Debug, Clone)]
pub struct PoliciesClient {
    api: ApiClient,
    options: RequestOptions,
}

impl PoliciesClient {
    /// Construct a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WafClientConfig) -> Result<Self> {
        PoliciesClientBuilder::new(config).build()
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

    /// Create a policy.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::Conflict`] if the name is taken, or any
    /// other classified failure.
    pub async fn create_policy(&self, policy: &NewPolicy) -> Result<Policy> {
        let request = Request::json(
            Endpoint::json(POLICY_CREATE, ApiVersion::V2, HttpMethod::Post, "policies"),
            policy,
        )?;
        let created: Policy = self.api.call_data(request, &self.options).await?;
        info!(policy_id = %created.id, policy_type = %created.policy_type, "Policy created");
        Ok(created)
    }

    /// Fetch a policy.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::NotFound`] if the policy does not exist.
    pub async fn get_policy(&self, policy_id: PolicyId) -> Result<Policy> {
        let request = Request::new(Endpoint::json(
            POLICY_READ,
            ApiVersion::V2,
            HttpMethod::Get,
            policy_path(policy_id),
        ));
        self.api.call_data(request, &self.options).await
    }

    /// Replace a policy and return the stored version.
    ///
    /// # Errors
    ///
    /// Returns any classified failure, including not-found.
    pub async fn update_policy(&self, policy_id: PolicyId, policy: &PolicyUpdate) -> Result<Policy> {
        let request = Request::json(
            Endpoint::json(
                POLICY_UPDATE,
                ApiVersion::V2,
                HttpMethod::Put,
                policy_path(policy_id),
            ),
            policy,
        )?;
        self.api.call_data(request, &self.options).await
    }

    /// Delete a policy. Deleting an unknown policy succeeds.
    ///
    /// # Errors
    ///
    /// Returns any classified failure other than not-found.
    pub async fn delete_policy(&self, policy_id: PolicyId) -> Result<()> {
        let request = Request::new(Endpoint::json(
            POLICY_DELETE,
            ApiVersion::V2,
            HttpMethod::Delete,
            policy_path(policy_id),
        ));
        if self
            .api
            .call_absent_ok(request, &self.options)
            .await?
            .is_none()
        {
            info!(%policy_id, "Policy already deleted");
        }
        Ok(())
    }

    /// List the account's policies, including their asset associations.
    ///
    /// # Errors
    ///
    /// Returns any classified failure.
    pub async fn list_policies(&self) -> Result<Vec<Policy>> {
        let request = Request::new(Endpoint::json(
            POLICY_LIST,
            ApiVersion::V2,
            HttpMethod::Get,
            "policies",
        ))
        .with_query(vec![("extended", "true".to_string())]);
        let list: PolicyList = self.api.call_payload(request, &self.options).await?;
        Ok(list.value)
    }

    /// Apply a policy to an asset. Re-applying is accepted by the API.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::NotFound`] if the policy or asset does not
    /// exist, or any other classified failure.
    pub async fn apply_policy_to_asset(
        &self,
        policy_id: PolicyId,
        asset_type: AssetType,
        asset_id: u64,
    ) -> Result<()> {
        let request = Request::new(Endpoint::json(
            POLICY_ASSET_APPLY,
            ApiVersion::V2,
            HttpMethod::Post,
            asset_path(asset_type, asset_id, policy_id),
        ));
        self.api.call(request, &self.options).await?;
        info!(%policy_id, %asset_type, asset_id, "Policy applied");
        Ok(())
    }

    /// Detach a policy from an asset. Detaching an absent association succeeds.
    ///
    /// # Errors
    ///
    /// Returns any classified failure other than not-found.
    pub async fn remove_policy_from_asset(
        &self,
        policy_id: PolicyId,
        asset_type: AssetType,
        asset_id: u64,
    ) -> Result<()> {
        let request = Request::new(Endpoint::json(
            POLICY_ASSET_REMOVE,
            ApiVersion::V2,
            HttpMethod::Delete,
            asset_path(asset_type, asset_id, policy_id),
        ));
        self.api
            .call_absent_ok(request, &self.options)
            .await
            .map(|_| ())
    }
}
