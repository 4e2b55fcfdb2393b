//! # waf-core
//!
//! Request construction, response normalization and retry handling for the
//! WAF/CDN control-plane API.
//!
//! Every resource adapter funnels through the same chain: a [`transport`]
//! executes the authenticated request, the [`decode`] module normalizes the
//! body (including result codes that arrive as either JSON numbers or JSON
//! strings), the [`classify`] module turns status code plus result code into
//! an [`Outcome`], and [`retry`] re-runs the chain for transient failures.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and failure diagnostics
//! - [`credentials`] - API id / API key pair
//! - [`endpoint`] - Endpoint descriptors (path, method, encoding, API generation)
//! - [`form`] - Form/query parameter builder
//! - [`ids`] - Strongly-typed resource identifiers
//! - [`transport`] - HTTP transport seam and reqwest implementation
//! - [`decode`] - Response decoder and polymorphic result codes
//! - [`classify`] - Outcome classifier and sentinel table
//! - [`retry`] - Retry budget, backoff and cancellation
//! - [`config`] - Client configuration
//! - [`client`] - The [`ApiClient`] used by resource adapters

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod client;
pub mod config;
pub mod credentials;
pub mod decode;
pub mod endpoint;
pub mod error;
pub mod form;
pub mod ids;
pub mod retry;
pub mod transport;

// Re-export commonly used types
pub use classify::{Classifier, Outcome, SentinelKind, SentinelTable, Verdict};
pub use client::{ApiClient, ApiClientBuilder, ClientConfig, RequestOptions};
pub use config::WafClientConfig;
pub use credentials::Credentials;
pub use decode::{DecodedBody, ErrorEntry, ResultCode};
pub use endpoint::{ApiVersion, Encoding, Endpoint, HttpMethod};
pub use error::{Error, Failure, Result};
pub use form::FormParams;
pub use ids::{AccountId, CacheRuleId, DataCenterId, PolicyId, ServerId, SiteId};
pub use retry::{with_retry, Backoff, OperationContext, RetryBudget};
pub use transport::{BaseUrls, HttpTransport, Payload, RawResponse, Request, Transport};
