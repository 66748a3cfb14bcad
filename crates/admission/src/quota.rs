//! Quota notation: `"30 per minute"`, `"100/hour"`, `"5 per 10 seconds"`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaParseError {
    #[error("quota `{0}` is not of the form `<n> per <unit>`")]
    Syntax(String),
    #[error("unknown quota unit `{0}` (expected second, minute, hour or day)")]
    Unit(String),
    #[error("quota limit must be a positive integer, got `{0}`")]
    Limit(String),
}

/// At most `limit` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quota {
    pub limit: u32,
    pub window: Duration,
}

impl Quota {
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub const fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub const fn per_hour(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(3600))
    }
}

fn unit_seconds(unit: &str) -> Option<u64> {
    match unit.trim_end_matches('s') {
        "second" | "sec" => Some(1),
        "minute" | "min" => Some(60),
        "hour" => Some(3600),
        "day" => Some(86_400),
        _ => None,
    }
}

impl FromStr for Quota {
    type Err = QuotaParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('/', " per ");
        let mut words = normalized.split_whitespace();

        let limit_word = words.next().ok_or_else(|| QuotaParseError::Syntax(s.to_string()))?;
        let limit: u32 = limit_word
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| QuotaParseError::Limit(limit_word.to_string()))?;
        if words.next() != Some("per") {
            return Err(QuotaParseError::Syntax(s.to_string()));
        }

        let rest: Vec<&str> = words.collect();
        let (multiplier, unit) = match rest.as_slice() {
            [unit] => (1, *unit),
            [count, unit] => (
                count
                    .parse::<u64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| QuotaParseError::Syntax(s.to_string()))?,
                *unit,
            ),
            _ => return Err(QuotaParseError::Syntax(s.to_string())),
        };
        let seconds = unit_seconds(unit).ok_or_else(|| QuotaParseError::Unit(unit.to_string()))?;

        Ok(Quota::new(limit, Duration::from_secs(seconds * multiplier)))
    }
}

impl TryFrom<String> for Quota {
    type Error = QuotaParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quota> for String {
    fn from(quota: Quota) -> Self {
        quota.to_string()
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.window.as_secs();
        let (amount, unit) = [(86_400, "day"), (3600, "hour"), (60, "minute")]
            .into_iter()
            .find(|(size, _)| secs >= *size && secs % size == 0)
            .map(|(size, unit)| (secs / size, unit))
            .unwrap_or((secs, "second"));
        if amount == 1 {
            write!(f, "{} per {unit}", self.limit)
        } else {
            write!(f, "{} per {amount} {unit}s", self.limit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_limiter_notation() {
        assert_eq!("30 per minute".parse::<Quota>().unwrap(), Quota::per_minute(30));
        assert_eq!("100 per hour".parse::<Quota>().unwrap(), Quota::per_hour(100));
        assert_eq!("60/minute".parse::<Quota>().unwrap(), Quota::per_minute(60));
        assert_eq!(
            "5 per 10 seconds".parse::<Quota>().unwrap(),
            Quota::new(5, Duration::from_secs(10))
        );
        assert_eq!(
            " 2 PER Day ".parse::<Quota>().unwrap(),
            Quota::new(2, Duration::from_secs(86_400))
        );
    }

    #[test]
    fn rejects_bad_notation() {
        assert!(matches!("per minute".parse::<Quota>(), Err(QuotaParseError::Limit(_))));
        assert!(matches!("0 per minute".parse::<Quota>(), Err(QuotaParseError::Limit(_))));
        assert!(matches!("10 every minute".parse::<Quota>(), Err(QuotaParseError::Syntax(_))));
        assert!(matches!("10 per fortnight".parse::<Quota>(), Err(QuotaParseError::Unit(_))));
        assert!(matches!("".parse::<Quota>(), Err(QuotaParseError::Syntax(_))));
    }

    #[test]
    fn display_round_trips() {
        for text in ["30 per minute", "100 per hour", "5 per 10 seconds", "3 per 2 days"] {
            let quota: Quota = text.parse().unwrap();
            assert_eq!(quota.to_string(), text);
        }
    }

    #[test]
    fn deserializes_from_string() {
        let quota: Quota = serde_json::from_str(r#""30 per minute""#).unwrap();
        assert_eq!(quota, Quota::per_minute(30));
        assert!(serde_json::from_str::<Quota>(r#""lots""#).is_err());
    }
}
