//! Delivery rules on the v3 API.
//!
//! Rules are managed per category as one ordered list; writing a category
//! replaces every rule in it.

use crate::models::{DeliveryRule, DeliveryRuleSet, DeliveryRuleSetList, RuleCategory};
use crate::Result;
use tracing::info;
use waf_core::{ApiClient, ApiVersion, Endpoint, HttpMethod, Request, RequestOptions, SiteId};

pub(crate) const DELIVERY_RULES_READ: &str = "delivery_rules.read";
pub(crate) const DELIVERY_RULES_UPDATE: &str = "delivery_rules.update";

/// Delivery rule operations.
#[derive(Debug, Clone)]
pub struct DeliveryRulesClient {
    api: ApiClient,
    options: RequestOptions,
}

fn rules_endpoint(name: &'static str, method: HttpMethod, site_id: SiteId) -> Endpoint {
    Endpoint::json(
        name,
        ApiVersion::V3,
        method,
        format!("sites/{site_id}/delivery-rules-configuration"),
    )
}

fn category_query(category: RuleCategory) -> Vec<(&'static str, String)> {
    vec![("category", category.as_str().to_string())]
}

impl DeliveryRulesClient {
    pub(crate) const fn new(api: ApiClient, options: RequestOptions) -> Self {
        Self { api, options }
    }

    /// Read the rules of one category, in evaluation order.
    ///
    /// # Errors
    ///
    /// Returns [`waf_core::Error::NotFound`] for unknown sites, or any other
    /// classified failure.
    pub async fn get_rules(
        &self,
        site_id: SiteId,
        category: RuleCategory,
    ) -> Result<Vec<DeliveryRule>> {
        let request = Request::new(rules_endpoint(DELIVERY_RULES_READ, HttpMethod::Get, site_id))
            .with_query(category_query(category));
        let sets: DeliveryRuleSetList = self.api.call_payload(request, &self.options).await?;
        Ok(sets.into_rules())
    }

    /// Replace the rules of one category and return what the API stored.
    ///
    /// An empty list clears the category.
    ///
    /// # Errors
    ///
    /// Returns any classified failure; validation errors arrive in the
    /// failure message.
    pub async fn put_rules(
        &self,
        site_id: SiteId,
        category: RuleCategory,
        rules: Vec<DeliveryRule>,
    ) -> Result<Vec<DeliveryRule>> {
        let count = rules.len();
        let body = DeliveryRuleSet { rules_list: rules };
        let request = Request::json(
            rules_endpoint(DELIVERY_RULES_UPDATE, HttpMethod::Put, site_id),
            &body,
        )?
        .with_query(category_query(category));
        let sets: DeliveryRuleSetList = self.api.call_payload(request, &self.options).await?;
        info!(%site_id, %category, count, "Delivery rules replaced");
        Ok(sets.into_rules())
    }
}
