//! Expectation record types and originator pattern matching.

use crate::assess::AssessmentMode;
use crate::{GatewatchError, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking the short-identifier pattern form in the store file.
const ID_PREFIX: &str = "id:";

/// Trailing parenthesized alphanumeric token, e.g. a developer team id.
static TRAILING_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Za-z0-9]+)\)$").expect("trailing token regex"));

/// The expected originator of a signed target, in one of two comparison
/// forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginatorPattern {
    /// Short-identifier form, persisted as `id:XXXX`. Matches any reported
    /// identity ending with `(XXXX)`.
    Id(String),
    /// Anchored expression, persisted verbatim. Built at canonicalization
    /// time by escaping the whole observed identity, so it matches only
    /// that exact string.
    Anchored(String),
}

impl OriginatorPattern {
    /// Parse the persisted string form. Infallible: anything without the
    /// `id:` prefix is an anchored expression.
    pub fn parse(stored: &str) -> Self {
        match stored.strip_prefix(ID_PREFIX) {
            Some(token) => OriginatorPattern::Id(token.to_string()),
            None => OriginatorPattern::Anchored(stored.to_string()),
        }
    }

    /// Canonical pattern for a freshly observed identity: the trailing
    /// parenthesized token when present, otherwise the whole identity as
    /// an exact anchored expression.
    pub fn canonicalize(observed: &str) -> Self {
        match TRAILING_TOKEN.captures(observed) {
            Some(caps) => OriginatorPattern::Id(caps[1].to_string()),
            None => OriginatorPattern::Anchored(format!("^{}$", regex::escape(observed))),
        }
    }

    /// Whether the reported identity satisfies this pattern.
    ///
    /// An anchored expression that no longer compiles (hand-edited store)
    /// is a store-data error, not a mismatch.
    pub fn matches(&self, observed: &str) -> Result<bool> {
        match self {
            OriginatorPattern::Id(token) => Ok(observed.ends_with(&format!("({token})"))),
            OriginatorPattern::Anchored(pattern) => {
                let expr = Regex::new(pattern).map_err(|source| GatewatchError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                Ok(expr.is_match(observed))
            }
        }
    }
}

impl fmt::Display for OriginatorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginatorPattern::Id(token) => write!(f, "{ID_PREFIX}{token}"),
            OriginatorPattern::Anchored(pattern) => f.write_str(pattern),
        }
    }
}

impl Serialize for OriginatorPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OriginatorPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let stored = String::deserialize(deserializer)?;
        Ok(OriginatorPattern::parse(&stored))
    }
}

/// One tracked path's expectation. Every field is optional: a brand-new
/// record starts empty and gains its originator on the first
/// reconciliation that persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectationRecord {
    /// Expected originator; absent means not yet established.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originator: Option<OriginatorPattern>,

    /// Assessment mode override; absent means inferred from the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_type: Option<AssessmentMode>,

    /// When this record was last persisted by a reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}
