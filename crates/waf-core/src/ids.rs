//! Strongly-typed numeric identifiers for WAF resources.
//!
//! The control plane returns ids as JSON numbers on some endpoints and as
//! JSON strings on others; every wrapper here accepts both.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Decode a full-range `u64` from a JSON number or a decimal string.
fn unsigned_from_json(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Macro to generate strongly-typed numeric id wrappers.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw id.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw id.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Parses an id from a decimal string.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not a non-negative integer.
            pub fn parse_str(input: &str) -> Result<Self> {
                input.trim().parse::<u64>().map(Self).map_err(|_| {
                    Error::InvalidRequest(format!(
                        "invalid {}: `{input}`",
                        stringify!($name)
                    ))
                })
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let value = Value::deserialize(deserializer)?;
                unsigned_from_json(&value).map(Self).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "{} must be a non-negative integer, got {value}",
                        stringify!($name)
                    ))
                })
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse_str(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(SiteId, "Site id");
id_type!(AccountId, "Account id");
id_type!(DataCenterId, "Data center id");
id_type!(ServerId, "Origin server id");
id_type!(CacheRuleId, "Cache rule id");
id_type!(PolicyId, "Policy id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_number_and_string() {
        let from_number: SiteId = serde_json::from_str("123456").unwrap();
        let from_string: SiteId = serde_json::from_str("\"123456\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number.get(), 123_456);
    }

    #[test]
    fn test_id_serializes_as_number() {
        let id = DataCenterId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_id_rejects_invalid_input() {
        assert!(serde_json::from_str::<ServerId>("-1").is_err());
        assert!(serde_json::from_str::<ServerId>("\"abc\"").is_err());
        assert!(matches!(
            "abc".parse::<PolicyId>(),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_id_accepts_full_u64_range() {
        let max = u64::MAX.to_string();
        let from_number: SiteId = serde_json::from_str(&max).unwrap();
        let from_string: SiteId = serde_json::from_str(&format!("\"{max}\"")).unwrap();
        assert_eq!(from_number, SiteId::new(u64::MAX));
        assert_eq!(from_string, SiteId::new(u64::MAX));

        let above_signed = (1_u64 << 63).to_string();
        let id: AccountId = serde_json::from_str(&above_signed).unwrap();
        assert_eq!(id.get(), 1_u64 << 63);

        assert!(serde_json::from_str::<SiteId>("18446744073709551616").is_err());
        assert!(serde_json::from_str::<SiteId>("1.5").is_err());
    }

    #[test]
    fn test_id_parse_and_convert() {
        let id: CacheRuleId = " 77 ".parse().unwrap();
        assert_eq!(u64::from(id), 77);
        assert_eq!(CacheRuleId::from(77), id);
    }

    #[test]
    fn test_id_types_are_distinct() {
        // Same value, different types; this is a compile-time check.
        let site = SiteId::new(1);
        let account = AccountId::new(1);
        assert_eq!(site.get(), account.get());
    }
}
