//! Caching rules of a site.

use crate::client::site_params;
use crate::models::{AddedCacheRule, CacheRule, CacheRuleList, CacheRuleSpec};
use crate::Result;
use tracing::info;
use waf_core::{
    ApiClient, CacheRuleId, Endpoint, Error, Failure, Request, RequestOptions, SiteId,
};

pub(crate) const CACHE_RULE_ADD: &str = "cache_rule.add";
pub(crate) const CACHE_RULE_EDIT: &str = "cache_rule.edit";
pub(crate) const CACHE_RULE_DELETE: &str = "cache_rule.delete";
pub(crate) const CACHE_RULE_LIST: &str = "cache_rule.list";

/// Caching rule operations.
#[derive(Debug, Clone)]
pub struct CacheRulesClient {
    api: ApiClient,
    options: RequestOptions,
}

impl CacheRulesClient {
    pub(crate) const fn new(api: ApiClient, options: RequestOptions) -> Self {
        Self { api, options }
    }

    /// Add a caching rule.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::Conflict`] for duplicate rule names, or any
    /// other classified failure.
    pub async fn add_cache_rule(&self, site_id: SiteId, rule: &CacheRuleSpec) -> Result<CacheRuleId> {
        let request = Request::form(
            Endpoint::legacy(CACHE_RULE_ADD, "sites/performance/caching-rules/add"),
            rule.to_params(site_id, None),
        );
        let added: AddedCacheRule = self.api.call_payload(request, &self.options).await?;
        info!(%site_id, rule_id = %added.rule_id, "Cache rule created");
        Ok(added.rule_id)
    }

    /// Replace a caching rule.
    ///
    /// # Errors
    ///
    /// Returns any classified failure, including not-found.
    pub async fn edit_cache_rule(
        &self,
        site_id: SiteId,
        rule_id: CacheRuleId,
        rule: &CacheRuleSpec,
    ) -> Result<()> {
        let request = Request::form(
            Endpoint::legacy(CACHE_RULE_EDIT, "sites/performance/caching-rules/edit"),
            rule.to_params(site_id, Some(rule_id)),
        );
        self.api.call(request, &self.options).await.map(|_| ())
    }

    /// Delete a caching rule. Deleting an unknown rule succeeds.
    ///
    /// # Errors
    ///
    /// Returns any classified failure other than not-found.
    pub async fn delete_cache_rule(&self, site_id: SiteId, rule_id: CacheRuleId) -> Result<()> {
        let mut params = site_params(site_id);
        params.push("rule_id", rule_id);
        let request = Request::form(
            Endpoint::legacy(CACHE_RULE_DELETE, "sites/performance/caching-rules/delete"),
            params,
        );
        self.api
            .call_absent_ok(request, &self.options)
            .await
            .map(|_| ())
    }

    /// List the caching rules of a site.
    ///
    /// # Errors
    ///
    /// Returns any classified failure.
    pub async fn list_cache_rules(&self, site_id: SiteId) -> Result<Vec<CacheRule>> {
        let request = Request::form(
            Endpoint::legacy(CACHE_RULE_LIST, "sites/performance/caching-rules/list"),
            site_params(site_id),
        );
        let list: CacheRuleList = self.api.call_payload(request, &self.options).await?;
        Ok(list.data)
    }

    /// Find a rule by id in the site's rule list.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::NotFound`] if the site has no such rule.
    pub async fn get_cache_rule(&self, site_id: SiteId, rule_id: CacheRuleId) -> Result<CacheRule> {
        self.list_cache_rules(site_id)
            .await?
            .into_iter()
            .find(|rule| rule.id == rule_id)
            .ok_or_else(|| {
                Error::NotFound(Failure::new(
                    CACHE_RULE_LIST,
                    format!("cache rule {rule_id} not found on site {site_id}"),
                ))
            })
    }
}
