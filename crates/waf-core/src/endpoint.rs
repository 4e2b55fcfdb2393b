//! Endpoint descriptors.
//!
//! An [`Endpoint`] says where a logical operation goes and how its body is
//! encoded. The name doubles as the key into the classifier's sentinel table,
//! so it must stay stable for a given operation.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// API generation, each served from its own base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Legacy provisioning API (form bodies, `res` envelopes)
    Legacy,
    /// v2 JSON API
    V2,
    /// v3 JSON API
    V3,
}

impl ApiVersion {
    /// Returns the generation name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// `application/x-www-form-urlencoded`, credentials as form fields
    Form,
    /// `application/json`, credentials as headers
    Json,
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// Response envelope convention of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// JSON object with a mandatory `res` result code
    Legacy,
    /// JSON object or array; HTTP status is authoritative, optional `errors`
    Modern,
}

/// Immutable (path, method, encoding) descriptor of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: &'static str,
    api: ApiVersion,
    method: HttpMethod,
    encoding: Encoding,
    path: Cow<'static, str>,
}

impl Endpoint {
    /// Create an endpoint from all parts.
    #[must_use]
    pub fn new(
        name: &'static str,
        api: ApiVersion,
        method: HttpMethod,
        encoding: Encoding,
        path: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name,
            api,
            method,
            encoding,
            path: path.into(),
        }
    }

    /// Legacy provisioning endpoint: form-encoded POST.
    #[must_use]
    pub fn legacy(name: &'static str, path: &'static str) -> Self {
        Self::new(
            name,
            ApiVersion::Legacy,
            HttpMethod::Post,
            Encoding::Form,
            path,
        )
    }

    /// JSON endpoint on one of the newer API generations.
    #[must_use]
    pub fn json(
        name: &'static str,
        api: ApiVersion,
        method: HttpMethod,
        path: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new(name, api, method, Encoding::Json, path)
    }

    /// Stable operation name, e.g. `data_center.delete`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// API generation.
    #[must_use]
    pub const fn api(&self) -> ApiVersion {
        self.api
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Body encoding.
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Path relative to the API generation's base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Response envelope convention.
    #[must_use]
    pub const fn shape(&self) -> ResponseShape {
        match self.api {
            ApiVersion::Legacy => ResponseShape::Legacy,
            ApiVersion::V2 | ApiVersion::V3 => ResponseShape::Modern,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {:?} {})", self.name, self.api, self.method, self.path)
    }
}
