use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{domain::parse_code, error::ScopeParseError};

/// A feeder/transformer pair both tables are reconciled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub feeder: i64,
    pub dtr: i64,
}

impl Scope {
    pub fn new(feeder: i64, dtr: i64) -> Self {
        Self { feeder, dtr }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.feeder, self.dtr)
    }
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (feeder, dtr) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| ScopeParseError::Malformed(s.to_string()))?;
        let feeder_code = parse_code(feeder).ok_or_else(|| ScopeParseError::InvalidCode {
            field: "feeder",
            value: feeder.to_string(),
        })?;
        let dtr_code = parse_code(dtr).ok_or_else(|| ScopeParseError::InvalidCode {
            field: "dtr",
            value: dtr.to_string(),
        })?;
        Ok(Self::new(feeder_code, dtr_code))
    }
}

/// How an observed consumer that is not tagged to the scoped transformer
/// qualifies as "wrongly mapped".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WronglyMappedPolicy {
    /// Must be tagged in the master table to another transformer on the same feeder.
    #[default]
    SameFeederOtherDtr,
    /// Any observed consumer absent from the scoped master set.
    AnyMasterAbsence,
}

/// What presence in the observed extract means. Extracts named "outage_*"
/// are used both ways in the field, so callers have to say which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedMeaning {
    /// Consumers currently live/connected on the transformer.
    Live,
    /// Consumers experiencing an outage on the transformer.
    Outage,
}

impl fmt::Display for ObservedMeaning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Outage => f.write_str("outage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_round_trips_through_display() {
        let scope: Scope = "7088-57".parse().unwrap();
        assert_eq!(scope, Scope::new(7088, 57));
        assert_eq!(scope.to_string(), "7088-57");
    }

    #[test]
    fn scope_rejects_garbage() {
        assert!(matches!("7088".parse::<Scope>(), Err(ScopeParseError::Malformed(_))));
        assert!(matches!(
            "7088-x".parse::<Scope>(),
            Err(ScopeParseError::InvalidCode { field: "dtr", .. })
        ));
    }
}
