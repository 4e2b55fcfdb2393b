//! Response decoding.
//!
//! Turns a [`RawResponse`] into a [`DecodedBody`]. The result code (`res`) is
//! documented as numeric but some endpoints send `0` and others `"0"`; both go
//! through [`ResultCode::from_json`] so no endpoint is special-cased.

use crate::endpoint::{Endpoint, ResponseShape};
use crate::error::{Error, Result};
use crate::transport::RawResponse;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Maximum number of body bytes copied into diagnostics.
pub const MAX_DIAGNOSTIC_BYTES: usize = 512;

/// Result code field of legacy envelopes.
pub const RESULT_CODE_FIELD: &str = "res";

/// Message field of legacy envelopes.
pub const RESULT_MESSAGE_FIELD: &str = "res_message";

/// Free-form detail object of legacy envelopes.
pub const DEBUG_INFO_FIELD: &str = "debug_info";

/// Decode an integer that may be a JSON number or a JSON string.
///
/// Numbers must be integral; strings must hold a base-10 integer, surrounding
/// whitespace allowed.
#[must_use]
pub fn integer_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// `deserialize_with` helper for integer fields with the same wire ambiguity.
///
/// # Errors
///
/// Fails when the value is neither an integer nor an integer string.
pub fn deserialize_integer<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    integer_from_json(&value)
        .ok_or_else(|| D::Error::custom(format!("expected integer or integer string, found {value}")))
}

/// Application-level status value, normalized to an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResultCode(i64);

impl ResultCode {
    /// Generic success code.
    pub const OK: Self = Self(0);

    /// Wrap a raw code.
    #[must_use]
    pub const fn new(code: i64) -> Self {
        Self(code)
    }

    /// The integer value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Returns true for the generic success code.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Numeric decode first, string decode second.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        integer_from_json(value).map(Self)
    }
}

impl From<i64> for ResultCode {
    fn from(code: i64) -> Self {
        Self(code)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ResultCode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_integer(deserializer).map(Self)
    }
}

/// One entry of a modern `errors` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Status code, number or string on the wire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResultCode>,
    /// Machine-readable code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human-readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorEntry {
    /// Best human-readable text for this entry.
    #[must_use]
    pub fn text(&self) -> &str {
        self.detail
            .as_deref()
            .filter(|detail| !detail.is_empty())
            .or(self.title.as_deref())
            .unwrap_or_default()
    }
}

/// Normalized response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBody {
    /// Result code, if the body carried one
    pub result_code: Option<ResultCode>,
    /// Backend message (`res_message`, `message`), empty when absent
    pub message: String,
    /// Fine-grained errors of modern endpoints
    pub errors: Vec<ErrorEntry>,
    /// String values found under legacy `debug_info`
    pub details: Vec<String>,
    /// The full parsed JSON document (`Null` for empty bodies)
    pub payload: Value,
}

impl DecodedBody {
    /// Deserialize the whole payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload does not match `T`.
    pub fn into_payload<T>(self, endpoint: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let snippet = truncate_value(&self.payload);
        serde_json::from_value(self.payload).map_err(|err| Error::Decode {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
            snippet,
        })
    }

    /// Deserialize the data envelope of a modern response.
    ///
    /// Modern endpoints wrap results in `data` (v3) or `value` (v2); bodies
    /// without either key are deserialized as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the data does not match `T`.
    pub fn into_data<T>(mut self, endpoint: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if let Value::Object(map) = &mut self.payload {
            if let Some(inner) = map.remove("data").or_else(|| map.remove("value")) {
                self.payload = inner;
            }
        }
        self.into_payload(endpoint)
    }

    /// All diagnostic text: message plus error entries.
    #[must_use]
    pub fn diagnostic_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.message.is_empty() {
            parts.push(&self.message);
        }
        parts.extend(self.errors.iter().map(ErrorEntry::text).filter(|t| !t.is_empty()));
        parts.join("; ")
    }

    /// Message followed by the `debug_info` details, for text matching.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        std::iter::once(self.message.as_str())
            .chain(self.details.iter().map(String::as_str))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Copy at most [`MAX_DIAGNOSTIC_BYTES`] of a body into a printable string.
#[must_use]
pub fn truncate_body(body: &[u8]) -> String {
    if body.len() <= MAX_DIAGNOSTIC_BYTES {
        return String::from_utf8_lossy(body).into_owned();
    }
    let mut text = String::from_utf8_lossy(&body[..MAX_DIAGNOSTIC_BYTES]).into_owned();
    text.push_str("...");
    text
}

fn truncate_value(value: &Value) -> String {
    truncate_body(value.to_string().as_bytes())
}

fn decode_error(endpoint: &Endpoint, message: impl Into<String>, body: &[u8]) -> Error {
    Error::Decode {
        endpoint: endpoint.name().to_string(),
        message: message.into(),
        snippet: truncate_body(body),
    }
}

/// Decode a raw response according to the endpoint's envelope convention.
///
/// Successful (2xx) responses must be well-formed; legacy ones must carry a
/// result code. Error responses are decoded leniently: an empty or non-JSON
/// body still yields a [`DecodedBody`] so the HTTP status can be classified.
///
/// # Errors
///
/// Returns [`Error::Decode`] on malformed JSON, a missing or unrecognised
/// result code, or a malformed `errors` array.
pub fn decode(raw: &RawResponse, endpoint: &Endpoint) -> Result<DecodedBody> {
    let is_success = raw.is_success();
    let shape = endpoint.shape();

    if raw.body.iter().all(u8::is_ascii_whitespace) {
        if is_success && shape == ResponseShape::Legacy {
            return Err(decode_error(
                endpoint,
                "empty body, result code is mandatory",
                &raw.body,
            ));
        }
        return Ok(DecodedBody::default());
    }

    let value: Value = match serde_json::from_slice(&raw.body) {
        Ok(value) => value,
        Err(err) if is_success => {
            return Err(decode_error(
                endpoint,
                format!("malformed JSON: {err}"),
                &raw.body,
            ))
        }
        Err(_) => {
            return Ok(DecodedBody {
                message: truncate_body(&raw.body),
                ..DecodedBody::default()
            })
        }
    };

    match shape {
        ResponseShape::Legacy => decode_legacy(value, endpoint, is_success, &raw.body),
        ResponseShape::Modern => decode_modern(value, endpoint, &raw.body),
    }
}

fn decode_legacy(
    value: Value,
    endpoint: &Endpoint,
    is_success: bool,
    body: &[u8],
) -> Result<DecodedBody> {
    let Value::Object(map) = &value else {
        if is_success {
            return Err(decode_error(endpoint, "expected a JSON object", body));
        }
        return Ok(DecodedBody {
            payload: value,
            ..DecodedBody::default()
        });
    };

    let result_code = match map.get(RESULT_CODE_FIELD) {
        Some(raw_code) => Some(ResultCode::from_json(raw_code).ok_or_else(|| {
            decode_error(
                endpoint,
                format!("unrecognised result code {raw_code}"),
                body,
            )
        })?),
        None if is_success => {
            return Err(decode_error(
                endpoint,
                format!("missing `{RESULT_CODE_FIELD}` field"),
                body,
            ))
        }
        None => None,
    };

    let mut details = Vec::new();
    if let Some(debug_info) = map.get(DEBUG_INFO_FIELD) {
        collect_strings(debug_info, &mut details);
    }

    Ok(DecodedBody {
        result_code,
        message: message_field(map, RESULT_MESSAGE_FIELD),
        errors: Vec::new(),
        details,
        payload: value,
    })
}

fn decode_modern(value: Value, endpoint: &Endpoint, body: &[u8]) -> Result<DecodedBody> {
    let Value::Object(map) = &value else {
        return Ok(DecodedBody {
            payload: value,
            ..DecodedBody::default()
        });
    };

    let result_code = match map.get(RESULT_CODE_FIELD) {
        Some(raw_code) => Some(ResultCode::from_json(raw_code).ok_or_else(|| {
            decode_error(
                endpoint,
                format!("unrecognised result code {raw_code}"),
                body,
            )
        })?),
        None => None,
    };

    let errors = match map.get("errors") {
        Some(Value::Null) | None => Vec::new(),
        Some(raw_errors) => Vec::<ErrorEntry>::deserialize(raw_errors).map_err(|err| {
            decode_error(endpoint, format!("malformed `errors` array: {err}"), body)
        })?,
    };

    let mut message = message_field(map, "message");
    if message.is_empty() {
        message = message_field(map, RESULT_MESSAGE_FIELD);
    }

    Ok(DecodedBody {
        result_code,
        message,
        errors,
        details: Vec::new(),
        payload: value,
    })
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) if !text.is_empty() => out.push(text.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

fn message_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
