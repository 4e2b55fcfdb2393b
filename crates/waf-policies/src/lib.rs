//! Policy client for the WAF/CDN control plane.
//!
//! Typed operations for the v2 JSON policy API: policy CRUD plus applying
//! policies to assets. Deletes and detaches are idempotent.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{PoliciesClient, PoliciesClientBuilder};
pub use models::{AssetRef, AssetType, NewPolicy, Policy, PolicyList, PolicySetting, PolicyType, PolicyUpdate};

/// Convenient result alias that reuses the shared WAF error type.
pub type Result<T> = waf_core::Result<T>;
