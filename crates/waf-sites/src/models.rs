//! Site, data center, cache rule, certificate and delivery rule models.
//!
//! Legacy endpoints report ids and flags inconsistently (numbers or strings,
//! booleans or `"true"`/`"false"`); the wrappers and [`flexible_bool`]
//! accept both spellings.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use waf_core::{AccountId, CacheRuleId, DataCenterId, FormParams, ServerId, SiteId};

/// Deserialize a flag sent as a JSON bool, a string or a 0/1 number.
///
/// # Errors
///
/// Fails for any other value.
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(flag),
        Value::Null => Ok(false),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(serde::de::Error::custom(format!("expected 0 or 1, found {number}"))),
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("expected boolean, found `{other}`"))),
        },
        other => Err(serde::de::Error::custom(format!("expected boolean, found {other}"))),
    }
}

const fn default_true() -> bool {
    true
}

/// Deserialize a list that may be missing or `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

/// Input for `sites/add`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSite {
    /// Fully qualified domain name.
    pub domain: String,
    /// Owning sub-account.
    pub account_id: Option<AccountId>,
    /// Customer reference id.
    pub ref_id: Option<String>,
    /// Send DNS setup emails.
    pub send_site_setup_emails: Option<bool>,
    /// Origin IP, when DNS lookup of the domain is not wanted.
    pub site_ip: Option<String>,
    /// Force SSL towards the origin.
    pub force_ssl: Option<bool>,
    /// Add the naked domain as a SAN.
    pub naked_domain_san: Option<bool>,
    /// Add a wildcard SAN.
    pub wildcard_san: Option<bool>,
    /// Log level (`full`, `security`, `none`).
    pub log_level: Option<String>,
    /// Account receiving the logs.
    pub logs_account_id: Option<AccountId>,
}

impl NewSite {
    /// Create the input for a domain.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Convert to form parameters.
    #[must_use]
    pub fn to_params(&self) -> FormParams {
        let mut params = FormParams::new();
        params.push("domain", &self.domain);
        params.push_opt("account_id", self.account_id);
        params.push_opt("ref_id", self.ref_id.as_ref());
        params.push_bool("send_site_setup_emails", self.send_site_setup_emails);
        params.push_opt("site_ip", self.site_ip.as_ref());
        params.push_bool("force_ssl", self.force_ssl);
        params.push_bool("naked_domain_san", self.naked_domain_san);
        params.push_bool("wildcard_san", self.wildcard_san);
        params.push_opt("log_level", self.log_level.as_ref());
        params.push_opt("logs_account_id", self.logs_account_id);
        params
    }
}

/// DNS instruction returned when a site is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsRecord {
    /// Record name.
    #[serde(default)]
    pub dns_record_name: Option<String>,
    /// Record type to set (`A`, `CNAME`).
    #[serde(default)]
    pub set_type_to: Option<String>,
    /// Values to set.
    #[serde(default)]
    pub set_data_to: Vec<String>,
}

/// Custom certificate attached to a site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomCertificate {
    /// Whether the certificate is in use.
    #[serde(default, deserialize_with = "flexible_bool")]
    pub active: bool,
    /// Expiry instant.
    #[serde(
        default,
        rename = "expirationDate",
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub expiration_date: Option<DateTime<Utc>>,
    /// Hash of the uploaded material, used to detect drift.
    #[serde(default, rename = "inputHash", skip_serializing_if = "Option::is_none")]
    pub input_hash: Option<String>,
}

/// SSL section of a site status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteSsl {
    /// Custom certificate, absent when none was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_certificate: Option<CustomCertificate>,
}

/// Site as returned by `sites/add`, `sites/status` and `sites/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteStatus {
    /// Site id.
    pub site_id: SiteId,
    /// Provisioning status (`pending-dns-changes`, `fully-configured`, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Domain name.
    #[serde(default)]
    pub domain: Option<String>,
    /// Owning account.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// Acceleration level.
    #[serde(default)]
    pub acceleration_level: Option<String>,
    /// Creation instant.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub site_creation_date: Option<DateTime<Utc>>,
    /// Origin IPs.
    #[serde(default)]
    pub ips: Vec<String>,
    /// DNS instructions.
    #[serde(default)]
    pub dns: Vec<DnsRecord>,
    /// `active` or `bypass`.
    #[serde(default)]
    pub active: Option<String>,
    /// SSL details.
    #[serde(default)]
    pub ssl: SiteSsl,
    /// Warnings attached by the backend.
    #[serde(default)]
    pub warnings: Vec<Value>,
}

/// Filter and paging for `sites/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSitesParams {
    /// Restrict to one account.
    pub account_id: Option<AccountId>,
    /// Page size.
    pub page_size: Option<u32>,
    /// Zero-based page number.
    pub page_num: Option<u32>,
}

impl ListSitesParams {
    /// Convert to form parameters.
    #[must_use]
    pub fn to_params(&self) -> FormParams {
        let mut params = FormParams::new();
        params.push_opt("account_id", self.account_id);
        params.push_opt("page_size", self.page_size);
        params.push_opt("page_num", self.page_num);
        params
    }
}

/// Body of `sites/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteList {
    /// One page of sites.
    #[serde(default)]
    pub sites: Vec<SiteStatus>,
}

// ---------------------------------------------------------------------------
// Data centers
// ---------------------------------------------------------------------------

/// Origin server inside a data center.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OriginServer {
    /// Server id.
    pub id: ServerId,
    /// IP or host name.
    pub address: String,
    /// Whether the server takes traffic.
    #[serde(
        default = "default_true",
        rename = "isEnabled",
        deserialize_with = "flexible_bool"
    )]
    pub is_enabled: bool,
    /// Standby server.
    #[serde(default, rename = "isStandby", deserialize_with = "flexible_bool")]
    pub is_standby: bool,
}

/// Data center with its servers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataCenter {
    /// Data center id.
    pub id: DataCenterId,
    /// Name.
    pub name: String,
    /// Whether the data center takes traffic.
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub enabled: bool,
    /// Serves only content requests.
    #[serde(default, rename = "contentOnly", deserialize_with = "flexible_bool")]
    pub content_only: bool,
    /// Currently active.
    #[serde(default, rename = "isActive", deserialize_with = "flexible_bool")]
    pub is_active: bool,
    /// Servers.
    #[serde(default)]
    pub servers: Vec<OriginServer>,
}

impl DataCenter {
    /// Find a server by id.
    #[must_use]
    pub fn server(&self, id: ServerId) -> Option<&OriginServer> {
        self.servers.iter().find(|server| server.id == id)
    }
}

/// Body of `sites/dataCenters/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataCenterList {
    /// Data centers with embedded servers.
    #[serde(default, rename = "DCs")]
    pub data_centers: Vec<DataCenter>,
}

/// Input for `sites/dataCenters/add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDataCenter {
    /// Site.
    pub site_id: SiteId,
    /// Name.
    pub name: String,
    /// First server address.
    pub server_address: String,
    /// Content-only data center.
    pub is_content: Option<bool>,
    /// Enabled flag.
    pub is_enabled: Option<bool>,
}

impl NewDataCenter {
    /// Convert to form parameters.
    #[must_use]
    pub fn to_params(&self) -> FormParams {
        let mut params = FormParams::new();
        params.push("site_id", self.site_id);
        params.push("name", &self.name);
        params.push("server_address", &self.server_address);
        params.push_bool("is_content", self.is_content);
        params.push_bool("is_enabled", self.is_enabled);
        params
    }
}

/// Changes for `sites/dataCenters/edit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataCenterUpdate {
    /// New name.
    pub name: Option<String>,
    /// Content-only flag.
    pub is_content: Option<bool>,
    /// Enabled flag.
    pub is_enabled: Option<bool>,
}

impl DataCenterUpdate {
    pub(crate) fn to_params(&self, id: DataCenterId) -> FormParams {
        let mut params = FormParams::new();
        params.push("dc_id", id);
        params.push_opt("name", self.name.as_ref());
        params.push_bool("is_content", self.is_content);
        params.push_bool("is_enabled", self.is_enabled);
        params
    }
}

/// Body of `sites/dataCenters/add`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AddedDataCenter {
    pub datacenter_id: DataCenterId,
}

/// Input for `sites/dataCenters/servers/add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewServer {
    /// Data center.
    pub dc_id: DataCenterId,
    /// IP or host name.
    pub server_address: String,
    /// Standby flag.
    pub is_standby: Option<bool>,
}

impl NewServer {
    /// Convert to form parameters.
    #[must_use]
    pub fn to_params(&self) -> FormParams {
        let mut params = FormParams::new();
        params.push("dc_id", self.dc_id);
        params.push("server_address", &self.server_address);
        params.push_bool("is_standby", self.is_standby);
        params
    }
}

/// Changes for `sites/dataCenters/servers/edit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerUpdate {
    /// New address.
    pub server_address: Option<String>,
    /// Standby flag.
    pub is_standby: Option<bool>,
    /// Enabled flag.
    pub is_enabled: Option<bool>,
}

impl ServerUpdate {
    pub(crate) fn to_params(&self, id: ServerId) -> FormParams {
        let mut params = FormParams::new();
        params.push("server_id", id);
        params.push_opt("server_address", self.server_address.as_ref());
        params.push_bool("is_standby", self.is_standby);
        params.push_bool("is_enabled", self.is_enabled);
        params
    }
}

/// Body of `sites/dataCenters/servers/add`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AddedServer {
    pub server_id: ServerId,
}

// ---------------------------------------------------------------------------
// Cache rules
// ---------------------------------------------------------------------------

/// Caching rule of a site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheRule {
    /// Rule id.
    #[serde(alias = "rule_id")]
    pub id: CacheRuleId,
    /// Name.
    pub name: String,
    /// Action (`HTTP_CACHE_MAKE_STATIC`, `HTTP_CACHE_CLIENT_CACHE_CTL`, ...).
    pub action: String,
    /// Rule filter expression.
    #[serde(default)]
    pub filter: Option<String>,
    /// Time to live in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Whether the rule is applied.
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub enabled: bool,
    /// Comma-separated parameters ignored for the cache key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_params: Option<String>,
    /// Free text used by some actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Header value used to differentiate cached objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differentiate_by_value: Option<String>,
}

/// Input for caching-rule add and edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheRuleSpec {
    /// Name.
    pub name: String,
    /// Action.
    pub action: String,
    /// Filter expression.
    pub filter: Option<String>,
    /// Time to live in seconds.
    pub ttl: Option<u64>,
    /// Enabled flag.
    pub enabled: Option<bool>,
    /// Ignored parameters.
    pub ignored_params: Option<String>,
    /// Free text.
    pub text: Option<String>,
    /// Differentiating header value.
    pub differentiate_by_value: Option<String>,
}

impl CacheRuleSpec {
    pub(crate) fn to_params(&self, site_id: SiteId, rule_id: Option<CacheRuleId>) -> FormParams {
        let mut params = FormParams::new();
        params.push("site_id", site_id);
        params.push_opt("rule_id", rule_id);
        params.push("name", &self.name);
        params.push("action", &self.action);
        params.push_opt("filter", self.filter.as_ref());
        params.push_opt("ttl", self.ttl);
        params.push_bool("enabled", self.enabled);
        params.push_opt("ignored_params", self.ignored_params.as_ref());
        params.push_opt("text", self.text.as_ref());
        params.push_opt("differentiate_by_value", self.differentiate_by_value.as_ref());
        params
    }
}

/// Body of `sites/performance/caching-rules/list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheRuleList {
    /// Rules of the site; empty when the API omits the list.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<CacheRule>,
}

/// Body of caching-rule add.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AddedCacheRule {
    pub rule_id: CacheRuleId,
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

/// Input for `sites/customCertificate/upload`.
#[derive(Debug)]
pub struct CertificateUpload {
    /// Base64-encoded certificate chain.
    pub certificate: String,
    /// Base64-encoded private key.
    pub private_key: Option<SecretString>,
    /// Key passphrase.
    pub passphrase: Option<SecretString>,
    /// Key type (`RSA`, `ECC`).
    pub auth_type: Option<String>,
}

impl CertificateUpload {
    /// Create an upload for a certificate without key material.
    #[must_use]
    pub fn new(certificate: impl Into<String>) -> Self {
        Self {
            certificate: certificate.into(),
            private_key: None,
            passphrase: None,
            auth_type: None,
        }
    }

    /// Attach the private key.
    #[must_use]
    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(SecretString::from(key.into()));
        self
    }

    /// Attach the key passphrase.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(SecretString::from(passphrase.into()));
        self
    }

    pub(crate) fn to_params(&self, site_id: SiteId) -> FormParams {
        let mut params = FormParams::new();
        params.push("site_id", site_id);
        params.push("certificate", &self.certificate);
        params.push_opt("private_key", self.private_key.as_ref().map(|key| key.expose_secret()));
        params.push_opt("passphrase", self.passphrase.as_ref().map(|phrase| phrase.expose_secret()));
        params.push_opt("auth_type", self.auth_type.as_ref());
        params
    }
}

// ---------------------------------------------------------------------------
// Delivery rules (v3)
// ---------------------------------------------------------------------------

/// Delivery rule category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCategory {
    /// Request rewrites
    Rewrite,
    /// Response rewrites
    RewriteResponse,
    /// Redirects with filters
    Redirect,
    /// Plain redirects
    SimplifiedRedirect,
    /// Forward to another data center
    Forward,
}

impl RuleCategory {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rewrite => "REWRITE",
            Self::RewriteResponse => "REWRITE_RESPONSE",
            Self::Redirect => "REDIRECT",
            Self::SimplifiedRedirect => "SIMPLIFIED_REDIRECT",
            Self::Forward => "FORWARD",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivery rule. Action-specific fields are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRule {
    /// Rule name.
    pub rule_name: String,
    /// Action (`RULE_ACTION_REWRITE_URL`, `RULE_ACTION_REDIRECT`, ...).
    pub action: String,
    /// Filter expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Whether the rule is applied.
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub enabled: bool,
    /// Action-specific fields (`from`, `to`, `headerName`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeliveryRule {
    /// Create an enabled rule without filter.
    #[must_use]
    pub fn new(rule_name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            action: action.into(),
            filter: None,
            enabled: true,
            extra: Map::new(),
        }
    }

    /// Set an action-specific field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Ordered rule list of one category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRuleSet {
    /// Rules in evaluation order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rules_list: Vec<DeliveryRule>,
}

/// Body of the delivery-rules configuration endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryRuleSetList {
    /// One set per requested category; empty when the API omits it.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<DeliveryRuleSet>,
}

impl DeliveryRuleSetList {
    /// Rules of the first set; the API returns one set per category.
    #[must_use]
    pub fn into_rules(self) -> Vec<DeliveryRule> {
        self.data
            .into_iter()
            .next()
            .map(|set| set.rules_list)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flexible_bool_accepts_all_spellings() {
        #[derive(Deserialize)]
        struct Flag {
            #[serde(deserialize_with = "flexible_bool")]
            value: bool,
        }

        for (raw, expected) in [
            (json!(true), true),
            (json!("true"), true),
            (json!("False"), false),
            (json!(1), true),
            (json!(0), false),
            (json!(null), false),
        ] {
            let flag: Flag = serde_json::from_value(json!({ "value": raw })).unwrap();
            assert_eq!(flag.value, expected);
        }
        assert!(serde_json::from_value::<Flag>(json!({ "value": "maybe" })).is_err());
    }

    #[test]
    fn new_site_params_skip_unset_fields() {
        let mut site = NewSite::new("www.example.com");
        site.account_id = Some(AccountId::new(10));
        site.force_ssl = Some(true);
        let params = site.to_params();
        assert_eq!(params.get("domain"), Some("www.example.com"));
        assert_eq!(params.get("account_id"), Some("10"));
        assert_eq!(params.get("force_ssl"), Some("true"));
        assert_eq!(params.get("site_ip"), None);
        assert_eq!(params.pairs().len(), 3);
    }

    #[test]
    fn data_center_with_string_flags() {
        let dc: DataCenter = serde_json::from_value(json!({
            "id": "111",
            "name": "main",
            "enabled": "true",
            "contentOnly": "false",
            "servers": [
                {"id": "222", "address": "10.0.0.1", "isEnabled": "true", "isStandby": "false"},
                {"id": 223, "address": "10.0.0.2", "isEnabled": false, "isStandby": true}
            ]
        }))
        .unwrap();
        assert_eq!(dc.id, DataCenterId::new(111));
        assert!(dc.enabled);
        assert!(!dc.content_only);
        assert!(dc.server(ServerId::new(223)).unwrap().is_standby);
        assert!(dc.server(ServerId::new(999)).is_none());
    }

    #[test]
    fn certificate_upload_params_expose_key_only_in_form() {
        let upload = CertificateUpload::new("Y2VydA==").with_private_key("a2V5");
        let params = upload.to_params(SiteId::new(5));
        assert_eq!(params.get("private_key"), Some("a2V5"));
        assert_eq!(params.get("passphrase"), None);
        assert!(!format!("{upload:?}").contains("a2V5"));
    }

    #[test]
    fn delivery_rule_keeps_action_fields() {
        let rule = DeliveryRule::new("to-https", "RULE_ACTION_REDIRECT")
            .with_field("from", "*")
            .with_field("to", "https://$host/$path")
            .with_field("responseCode", 301);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["ruleName"], "to-https");
        assert_eq!(value["responseCode"], 301);

        let back: DeliveryRule = serde_json::from_value(value).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn rule_category_wire_names() {
        assert_eq!(RuleCategory::SimplifiedRedirect.as_str(), "SIMPLIFIED_REDIRECT");
        assert_eq!(
            serde_json::to_string(&RuleCategory::RewriteResponse).unwrap(),
            "\"REWRITE_RESPONSE\""
        );
    }
}
