//! Site provisioning client for the WAF/CDN control plane.
//!
//! Typed operations for sites, data centers and origin servers, caching
//! rules, custom certificates (legacy API) and delivery rules (v3 API). Every
//! operation goes through [`waf_core::ApiClient`]; deletes are idempotent and
//! treat an already-absent resource as success.

#![deny(missing_docs)]

pub mod cache_rules;
pub mod certificates;
pub mod client;
pub mod data_centers;
pub mod delivery_rules;
pub mod models;

pub use cache_rules::CacheRulesClient;
pub use certificates::CertificatesClient;
pub use client::{SitesClient, SitesClientBuilder};
pub use data_centers::DataCentersClient;
pub use delivery_rules::DeliveryRulesClient;
pub use models::{
    CacheRule, CacheRuleList, CacheRuleSpec, CertificateUpload, CustomCertificate, DataCenter,
    DataCenterUpdate, DeliveryRule, DeliveryRuleSet, DeliveryRuleSetList, DnsRecord, ListSitesParams, NewDataCenter, NewServer, NewSite,
    OriginServer, RuleCategory, ServerUpdate, SiteStatus,
};

/// Convenient result alias that reuses the shared WAF error type.
pub type Result<T> = waf_core::Result<T>;
