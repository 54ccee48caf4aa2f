use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const MAX_KEY_LEN: usize = 32;

/// Normalized ticker-like key that scopes every stored artifact of one company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Normalizes a caller-supplied key: trimmed, uppercased, `[A-Z0-9._-]{1,32}`.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        Self::from_hint(raw)
            .ok_or_else(|| AppError::Validation(format!("invalid company id: {raw:?}")))
    }

    /// Like [`Self::parse`], but also rejects the placeholder values browsers send
    /// for unset form fields.
    pub fn from_hint(raw: &str) -> Option<Self> {
        let candidate = raw.trim().to_ascii_uppercase();
        if candidate.is_empty()
            || candidate.len() > MAX_KEY_LEN
            || candidate == "UNDEFINED"
            || candidate == "NULL"
            || candidate.starts_with('.')
        {
            return None;
        }

        candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            .then_some(Self(candidate))
    }

    /// Accepts a model-proposed exchange ticker: exchange suffixes stripped,
    /// 3 to 19 ASCII letters.
    pub fn from_ticker(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        let stripped = upper.replace(".NS", "").replace(".BO", "");
        let candidate = stripped.trim();

        ((3..20).contains(&candidate.len()) && candidate.chars().all(|c| c.is_ascii_alphabetic()))
            .then(|| Self(candidate.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_are_normalized() {
        let id = EntityId::from_hint("  infy ").expect("valid hint");
        assert_eq!(id.as_str(), "INFY");
        assert_eq!(
            EntityId::from_hint("tata-motors.ns").map(String::from),
            Some("TATA-MOTORS.NS".to_string())
        );
    }

    #[test]
    fn placeholder_and_unsafe_hints_are_rejected() {
        for raw in ["", "   ", "undefined", "NULL", "../etc", "a/b", "..", "x".repeat(33).as_str()] {
            assert!(EntityId::from_hint(raw).is_none(), "accepted {raw:?}");
        }
        assert!(matches!(
            EntityId::parse("bad/id"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn tickers_strip_exchange_suffix_and_require_letters() {
        assert_eq!(
            EntityId::from_ticker("tatamotors.ns").map(String::from),
            Some("TATAMOTORS".to_string())
        );
        assert_eq!(
            EntityId::from_ticker("RELIANCE.BO").map(String::from),
            Some("RELIANCE".to_string())
        );
        assert!(EntityId::from_ticker("AB").is_none());
        assert!(EntityId::from_ticker("M&M").is_none());
        assert!(EntityId::from_ticker("ABCDEFGHIJKLMNOPQRST").is_none());
        assert!(EntityId::from_ticker("INFY1").is_none());
    }

    #[test]
    fn serde_roundtrip_validates() {
        let id: EntityId = serde_json::from_str("\"acme\"").expect("deserialize");
        assert_eq!(id.as_str(), "ACME");
        assert!(serde_json::from_str::<EntityId>("\"a b\"").is_err());
    }
}
