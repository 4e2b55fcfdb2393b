//! Outcome classification.
//!
//! The control plane is inconsistent about which channel carries the verdict:
//! some endpoints answer HTTP 200 with a failing `res`, others answer a bare
//! non-2xx status. The [`Classifier`] reads both signals and applies a fixed
//! priority table; endpoint quirks live only in the [`SentinelTable`].

use crate::decode::{truncate_body, DecodedBody, ErrorEntry, ResultCode};
use crate::endpoint::Endpoint;
use crate::error::{Error, Failure, Result};
use crate::transport::RawResponse;
use std::collections::{BTreeSet, HashMap};

/// Statuses treated as transient regardless of the body.
pub const TRANSIENT_HTTP_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Legacy code: operation timed out on the backend.
pub const RES_OPERATION_TIMED_OUT: i64 = 4;
/// Legacy code: unknown or unauthorized site.
pub const RES_UNKNOWN_SITE: i64 = 9403;
/// Legacy code returned when deleting a data center that is already gone.
pub const RES_DATA_CENTER_ALREADY_DELETED: i64 = 9413;

/// Message fragments that mark a naming or uniqueness conflict.
pub const DEFAULT_CONFLICT_MARKERS: [&str; 4] = [
    "duplicate",
    "already exists",
    "already associated",
    "already in use",
];

/// Meaning of an endpoint-specific result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentinelKind {
    /// Treat as success (e.g. an idempotent delete that found nothing)
    Success,
    /// The resource does not exist
    AlreadyAbsent,
    /// The request collides with existing state
    Conflict,
    /// Retry later
    Transient,
}

/// Lookup table of result codes with special meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentinelTable {
    per_endpoint: HashMap<String, HashMap<i64, SentinelKind>>,
    transient_codes: BTreeSet<i64>,
    conflict_markers: Vec<String>,
}

impl SentinelTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the known control-plane quirks.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut table = Self::new()
            .with_sentinel(
                "data_center.delete",
                RES_DATA_CENTER_ALREADY_DELETED,
                SentinelKind::Success,
            )
            .with_sentinel("site.status", RES_UNKNOWN_SITE, SentinelKind::AlreadyAbsent)
            .with_sentinel("site.delete", RES_UNKNOWN_SITE, SentinelKind::AlreadyAbsent)
            .with_sentinel(
                "certificate.read",
                RES_UNKNOWN_SITE,
                SentinelKind::AlreadyAbsent,
            )
            .with_sentinel(
                "certificate.delete",
                RES_UNKNOWN_SITE,
                SentinelKind::AlreadyAbsent,
            )
            .with_transient_code(RES_OPERATION_TIMED_OUT);

        for marker in DEFAULT_CONFLICT_MARKERS {
            table = table.with_conflict_marker(marker);
        }
        table
    }

    /// Register a code with special meaning for one endpoint.
    #[must_use]
    pub fn with_sentinel(
        mut self,
        endpoint: impl Into<String>,
        code: i64,
        kind: SentinelKind,
    ) -> Self {
        self.per_endpoint
            .entry(endpoint.into())
            .or_default()
            .insert(code, kind);
        self
    }

    /// Register a code that is transient on every endpoint.
    #[must_use]
    pub fn with_transient_code(mut self, code: i64) -> Self {
        self.transient_codes.insert(code);
        self
    }

    /// Register a message fragment that marks a conflict (case-insensitive).
    #[must_use]
    pub fn with_conflict_marker(mut self, marker: impl Into<String>) -> Self {
        self.conflict_markers.push(marker.into().to_lowercase());
        self
    }

    /// Meaning of `code` on `endpoint`, if any.
    #[must_use]
    pub fn lookup(&self, endpoint: &str, code: ResultCode) -> Option<SentinelKind> {
        self.per_endpoint
            .get(endpoint)
            .and_then(|codes| codes.get(&code.value()))
            .copied()
            .or_else(|| {
                self.transient_codes
                    .contains(&code.value())
                    .then_some(SentinelKind::Transient)
            })
    }

    /// Returns true if any text mentions a conflict marker.
    #[must_use]
    pub fn mentions_conflict<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> bool {
        texts.into_iter().any(|text| {
            let text = text.to_lowercase();
            self.conflict_markers
                .iter()
                .any(|marker| text.contains(marker.as_str()))
        })
    }
}

/// Outcome category without payload, as produced by [`Classifier::verdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Success
    Success,
    /// Resource absent
    NotFound,
    /// Collision with existing state
    Conflict,
    /// Worth retrying
    TransientFailure,
    /// Will not change on retry
    PermanentFailure,
}

/// Normalized result of one API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Decoded success body
    Success(DecodedBody),
    /// Resource absent
    NotFound(Failure),
    /// Collision with existing state
    Conflict(Failure),
    /// Worth retrying
    TransientFailure(Failure),
    /// Will not change on retry
    PermanentFailure(Failure),
}

impl Outcome {
    /// Payload-free category.
    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        match self {
            Self::Success(_) => Verdict::Success,
            Self::NotFound(_) => Verdict::NotFound,
            Self::Conflict(_) => Verdict::Conflict,
            Self::TransientFailure(_) => Verdict::TransientFailure,
            Self::PermanentFailure(_) => Verdict::PermanentFailure,
        }
    }

    /// Returns true for [`Outcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Diagnostics of a non-success outcome.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Success(_) => None,
            Self::NotFound(failure)
            | Self::Conflict(failure)
            | Self::TransientFailure(failure)
            | Self::PermanentFailure(failure) => Some(failure),
        }
    }

    fn failure_mut(&mut self) -> Option<&mut Failure> {
        match self {
            Self::Success(_) => None,
            Self::NotFound(failure)
            | Self::Conflict(failure)
            | Self::TransientFailure(failure)
            | Self::PermanentFailure(failure) => Some(failure),
        }
    }

    /// Record the number of attempts on a failure.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        if let Some(failure) = self.failure_mut() {
            failure.attempts = attempts;
        }
        self
    }

    /// Record the operation id on a failure.
    #[must_use]
    pub fn with_operation_id(mut self, operation_id: &str) -> Self {
        if let Some(failure) = self.failure_mut() {
            failure.operation_id = Some(operation_id.to_string());
        }
        self
    }

    /// Convert into a result, treating every non-success as an error.
    ///
    /// # Errors
    ///
    /// Returns the error variant matching the outcome.
    pub fn into_result(self) -> Result<DecodedBody> {
        match self {
            Self::Success(body) => Ok(body),
            Self::NotFound(failure) => Err(Error::NotFound(failure)),
            Self::Conflict(failure) => Err(Error::Conflict(failure)),
            Self::TransientFailure(failure) => Err(Error::Transient(failure)),
            Self::PermanentFailure(failure) => Err(Error::Permanent(failure)),
        }
    }

    /// Convert into a result where an absent resource is not an error.
    ///
    /// Used by deletes, which are idempotent.
    ///
    /// # Errors
    ///
    /// Returns the error variant matching any other non-success outcome.
    pub fn absent_ok(self) -> Result<Option<DecodedBody>> {
        match self {
            Self::NotFound(_) => Ok(None),
            other => other.into_result().map(Some),
        }
    }
}

/// Maps HTTP status, result code and error list onto an [`Outcome`].
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    sentinels: SentinelTable,
}

impl Classifier {
    /// Create a classifier over a sentinel table.
    #[must_use]
    pub const fn new(sentinels: SentinelTable) -> Self {
        Self { sentinels }
    }

    /// The sentinel table in use.
    #[must_use]
    pub const fn sentinels(&self) -> &SentinelTable {
        &self.sentinels
    }

    /// Decide the outcome category. First matching rule wins:
    ///
    /// 1. any 2xx (legacy endpoints included), no errors, and a zero, absent
    ///    or success-sentinel code: success
    /// 2. 404 or an already-absent sentinel: not found
    /// 3. 409, a conflict sentinel, or a conflict marker in the messages: conflict
    /// 4. 429/502/503/504 or a transient code: transient failure
    /// 5. anything else: permanent failure
    #[must_use]
    pub fn verdict(
        &self,
        endpoint: &str,
        http_status: u16,
        result_code: Option<ResultCode>,
        errors: &[ErrorEntry],
        message: &str,
    ) -> Verdict {
        let sentinel = result_code.and_then(|code| self.sentinels.lookup(endpoint, code));
        let is_2xx = (200..300).contains(&http_status);
        let code_ok = match result_code {
            None => true,
            Some(code) => code.is_ok() || sentinel == Some(SentinelKind::Success),
        };

        if is_2xx && code_ok && errors.is_empty() {
            return Verdict::Success;
        }

        if http_status == 404 || sentinel == Some(SentinelKind::AlreadyAbsent) {
            return Verdict::NotFound;
        }

        let texts = std::iter::once(message).chain(errors.iter().map(ErrorEntry::text));
        if http_status == 409
            || sentinel == Some(SentinelKind::Conflict)
            || errors.iter().any(|e| e.status.map(ResultCode::value) == Some(409))
            || self.sentinels.mentions_conflict(texts)
        {
            return Verdict::Conflict;
        }

        if TRANSIENT_HTTP_STATUSES.contains(&http_status) || sentinel == Some(SentinelKind::Transient)
        {
            return Verdict::TransientFailure;
        }

        Verdict::PermanentFailure
    }

    /// Classify a decoded response, attaching diagnostics to failures.
    #[must_use]
    pub fn classify(&self, endpoint: &Endpoint, raw: &RawResponse, decoded: DecodedBody) -> Outcome {
        let verdict = self.verdict(
            endpoint.name(),
            raw.status,
            decoded.result_code,
            &decoded.errors,
            &decoded.searchable_text(),
        );

        if verdict == Verdict::Success {
            return Outcome::Success(decoded);
        }

        let mut message = decoded.diagnostic_text();
        if message.is_empty() {
            message = default_message(raw.status);
        }
        let mut failure = Failure::new(endpoint.name(), message)
            .with_http_status(raw.status)
            .with_body(truncate_body(&raw.body));
        failure.result_code = decoded.result_code.map(ResultCode::value);

        match verdict {
            Verdict::Success | Verdict::PermanentFailure => Outcome::PermanentFailure(failure),
            Verdict::NotFound => Outcome::NotFound(failure),
            Verdict::Conflict => Outcome::Conflict(failure),
            Verdict::TransientFailure => Outcome::TransientFailure(failure),
        }
    }
}

fn default_message(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map_or_else(|| format!("HTTP {status}"), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::endpoint::{ApiVersion, HttpMethod};

    fn classifier() -> Classifier {
        Classifier::new(SentinelTable::with_defaults())
    }

    fn code(value: i64) -> Option<ResultCode> {
        Some(ResultCode::new(value))
    }

    #[test]
    fn scenario_success() {
        assert_eq!(
            classifier().verdict("site.add", 200, code(0), &[], ""),
            Verdict::Success
        );
    }

    #[test]
    fn scenario_data_center_delete_sentinel_is_success() {
        assert_eq!(
            classifier().verdict("data_center.delete", 200, code(9413), &[], ""),
            Verdict::Success
        );
        // The sentinel is scoped to its endpoint.
        assert_eq!(
            classifier().verdict("data_center.edit", 200, code(9413), &[], ""),
            Verdict::PermanentFailure
        );
    }

    #[test]
    fn scenario_not_found_by_status() {
        assert_eq!(
            classifier().verdict("policy.read", 404, None, &[], ""),
            Verdict::NotFound
        );
    }

    #[test]
    fn scenario_transient_by_status() {
        for status in TRANSIENT_HTTP_STATUSES {
            assert_eq!(
                classifier().verdict("policy.read", status, None, &[], ""),
                Verdict::TransientFailure
            );
        }
    }

    #[test]
    fn scenario_conflict_from_message() {
        assert_eq!(
            classifier().verdict(
                "site.add",
                400,
                code(1),
                &[],
                "Site with this domain is a Duplicate"
            ),
            Verdict::Conflict
        );
    }

    #[test]
    fn any_2xx_status_counts_on_legacy_endpoints() {
        for status in [200, 201, 204] {
            assert_eq!(
                classifier().verdict("site.add", status, code(0), &[], ""),
                Verdict::Success
            );
        }
        assert_eq!(
            classifier().verdict("site.add", 201, code(1), &[], "Invalid input"),
            Verdict::PermanentFailure
        );
    }

    #[test]
    fn conflict_from_legacy_debug_info() {
        let endpoint = Endpoint::legacy("cache_rule.add", "sites/performance/caching-rules/add");
        let raw = RawResponse::new(
            400,
            r#"{"res":1,"res_message":"Invalid input","debug_info":{"Error":"duplicate rule name"}}"#,
        );
        let decoded = decode(&raw, &endpoint).unwrap();
        match classifier().classify(&endpoint, &raw, decoded) {
            Outcome::Conflict(failure) => {
                assert_eq!(failure.result_code, Some(1));
                assert!(failure.body.contains("duplicate rule name"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn conflict_from_status_and_error_list() {
        assert_eq!(
            classifier().verdict("policy.create", 409, None, &[], ""),
            Verdict::Conflict
        );

        let errors = vec![ErrorEntry {
            status: code(400),
            detail: Some("Policy name already exists".to_string()),
            ..ErrorEntry::default()
        }];
        assert_eq!(
            classifier().verdict("policy.create", 400, None, &errors, ""),
            Verdict::Conflict
        );
    }

    #[test]
    fn already_absent_sentinel_is_not_found() {
        assert_eq!(
            classifier().verdict("site.status", 200, code(9403), &[], "Unknown site"),
            Verdict::NotFound
        );
    }

    #[test]
    fn transient_result_code() {
        assert_eq!(
            classifier().verdict("site.add", 200, code(RES_OPERATION_TIMED_OUT), &[], ""),
            Verdict::TransientFailure
        );
    }

    #[test]
    fn failing_code_on_http_200_is_permanent() {
        assert_eq!(
            classifier().verdict("site.add", 200, code(2), &[], "Invalid input"),
            Verdict::PermanentFailure
        );
        assert_eq!(
            classifier().verdict("site.add", 401, None, &[], "Unauthorized"),
            Verdict::PermanentFailure
        );
    }

    #[test]
    fn error_list_blocks_success_on_2xx() {
        let errors = vec![ErrorEntry {
            detail: Some("invalid filter".to_string()),
            ..ErrorEntry::default()
        }];
        assert_eq!(
            classifier().verdict("delivery_rules.update", 200, None, &errors, ""),
            Verdict::PermanentFailure
        );
    }

    #[test]
    fn not_found_precedes_transient() {
        assert_eq!(
            classifier().verdict("site.status", 503, code(9403), &[], ""),
            Verdict::NotFound
        );
    }

    #[test]
    fn custom_sentinels_extend_the_table() {
        let classifier = Classifier::new(
            SentinelTable::new()
                .with_sentinel("cache_rule.delete", 6001, SentinelKind::AlreadyAbsent)
                .with_sentinel("site.add", 6002, SentinelKind::Conflict)
                .with_transient_code(9999),
        );
        assert_eq!(
            classifier.verdict("cache_rule.delete", 200, code(6001), &[], ""),
            Verdict::NotFound
        );
        assert_eq!(
            classifier.verdict("site.add", 200, code(6002), &[], ""),
            Verdict::Conflict
        );
        assert_eq!(
            classifier.verdict("anything", 200, code(9999), &[], ""),
            Verdict::TransientFailure
        );
        // No markers registered on an empty table.
        assert_eq!(
            classifier.verdict("site.add", 400, None, &[], "duplicate"),
            Verdict::PermanentFailure
        );
    }

    #[test]
    fn classify_attaches_diagnostics() {
        let endpoint = Endpoint::legacy("site.add", "sites/add");
        let raw = RawResponse::new(200, r#"{"res":"2","res_message":"Invalid input"}"#);
        let decoded = decode(&raw, &endpoint).unwrap();

        let outcome = classifier().classify(&endpoint, &raw, decoded);
        let failure = match outcome {
            Outcome::PermanentFailure(failure) => failure,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(failure.endpoint, "site.add");
        assert_eq!(failure.http_status, Some(200));
        assert_eq!(failure.result_code, Some(2));
        assert_eq!(failure.message, "Invalid input");
        assert!(failure.body.contains("Invalid input"));
        assert_eq!(failure.attempts, 1);
    }

    #[test]
    fn classify_bodyless_error_uses_reason_phrase() {
        let endpoint = Endpoint::json("policy.read", ApiVersion::V2, HttpMethod::Get, "policies/1");
        let raw = RawResponse::new(503, "");
        let decoded = decode(&raw, &endpoint).unwrap();

        let outcome = classifier().classify(&endpoint, &raw, decoded);
        assert_eq!(outcome.verdict(), Verdict::TransientFailure);
        assert_eq!(outcome.failure().unwrap().message, "Service Unavailable");
    }

    #[test]
    fn outcome_conversions() {
        let failure = Failure::new("site.delete", "gone");
        assert!(Outcome::NotFound(failure.clone()).absent_ok().unwrap().is_none());
        assert!(matches!(
            Outcome::NotFound(failure.clone()).into_result(),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            Outcome::Conflict(failure.clone()).absent_ok(),
            Err(Error::Conflict(_))
        ));
        assert!(Outcome::Success(DecodedBody::default())
            .absent_ok()
            .unwrap()
            .is_some());

        let annotated = Outcome::PermanentFailure(failure)
            .with_attempts(3)
            .with_operation_id("op-9");
        let failure = annotated.failure().unwrap();
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.operation_id.as_deref(), Some("op-9"));
    }
}
