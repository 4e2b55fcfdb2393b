//! Policy models of the v2 JSON API.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use waf_core::{AccountId, PolicyId};

/// Kind of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    /// IP, country and URL block lists
    Acl,
    /// Exceptions that bypass other policies
    Whitelist,
    /// Managed WAF rule settings
    WafRules,
}

impl PolicyType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Acl => "ACL",
            Self::Whitelist => "WHITELIST",
            Self::WafRules => "WAF_RULES",
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of asset a policy can be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    /// A protected site
    Website,
}

impl AssetType {
    /// Wire name of the asset type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Website => "WEBSITE",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One setting of a policy.
///
/// Setting bodies differ by policy type; the fields shared by all types are
/// typed and the rest is kept verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicySetting {
    /// Setting id, assigned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Setting type (`IP`, `GEO`, `URL`, ...).
    pub setting_type: String,
    /// Action taken on match (`BLOCK`, `ALLOW`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_setting_type: Option<String>,
    /// Matched values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Per-setting exceptions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_data_exceptions: Vec<Value>,
}

impl PolicySetting {
    /// Create a setting.
    #[must_use]
    pub fn new(setting_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            setting_type: setting_type.into(),
            policy_setting_type: Some(action.into()),
            ..Self::default()
        }
    }

    /// Set the matched values.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Association between a policy and an asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    /// Asset id.
    pub asset_id: u64,
    /// Asset type.
    pub asset_type: AssetType,
}

/// A policy as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Policy id.
    pub id: PolicyId,
    /// Name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Enabled flag.
    #[serde(default)]
    pub enabled: bool,
    /// Policy type.
    pub policy_type: PolicyType,
    /// Owning account.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// Settings.
    #[serde(default)]
    pub policy_settings: Vec<PolicySetting>,
    /// Assets the policy is applied to; present on extended listings.
    #[serde(default)]
    pub policy_assets: Vec<AssetRef>,
    /// Default policy for new assets of the account.
    #[serde(default)]
    pub default_policy_config: Vec<Value>,
}

impl Policy {
    /// Whether the policy is applied to the given asset.
    #[must_use]
    pub fn is_applied_to(&self, asset_type: AssetType, asset_id: u64) -> bool {
        self.policy_assets
            .iter()
            .any(|asset| asset.asset_type == asset_type && asset.asset_id == asset_id)
    }
}

/// Body of `GET policies`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyList {
    /// Policies of the account; empty when the API omits the list.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: Vec<Policy>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Policy>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Policy>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Body of `POST policies`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPolicy {
    /// Name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Enabled flag.
    pub enabled: bool,
    /// Policy type.
    pub policy_type: PolicyType,
    /// Account owning the policy; defaults to the caller's account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    /// Settings.
    pub policy_settings: Vec<PolicySetting>,
}

impl NewPolicy {
    /// Create an enabled policy without settings.
    #[must_use]
    pub fn new(name: impl Into<String>, policy_type: PolicyType) -> Self {
        Self {
            name: name.into(),
            description: None,
            enabled: true,
            policy_type,
            account_id: None,
            policy_settings: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the owning account.
    #[must_use]
    pub const fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Append a setting.
    #[must_use]
    pub fn with_setting(mut self, setting: PolicySetting) -> Self {
        self.policy_settings.push(setting);
        self
    }
}

/// Body of `PUT policies/{id}`; the API replaces the whole policy.
pub type PolicyUpdate = NewPolicy;

impl From<&Policy> for PolicyUpdate {
    fn from(policy: &Policy) -> Self {
        Self {
            name: policy.name.clone(),
            description: policy.description.clone(),
            enabled: policy.enabled,
            policy_type: policy.policy_type,
            account_id: policy.account_id,
            policy_settings: policy.policy_settings.clone(),
        }
    }
}
