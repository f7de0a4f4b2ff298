// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// The indexed collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Aip,
    Representation,
    PreservationMetadata,
    LogEntry,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Aip,
        EntityType::Representation,
        EntityType::PreservationMetadata,
        EntityType::LogEntry,
    ];

    pub fn key(self) -> &'static str {
        match self {
            EntityType::Aip => "aip",
            EntityType::Representation => "representation",
            EntityType::PreservationMetadata => "preservation_metadata",
            EntityType::LogEntry => "log_entry",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EntityType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.key() == s)
            .ok_or_else(|| IndexError::UnsupportedType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip() {
        for entity_type in EntityType::ALL {
            assert_eq!(entity_type.key().parse::<EntityType>().unwrap(), entity_type);
        }
        assert!(matches!(
            "job".parse::<EntityType>(),
            Err(IndexError::UnsupportedType(t)) if t == "job"
        ));
    }

    #[test]
    fn test_serde_matches_key() {
        let json = serde_json::to_string(&EntityType::PreservationMetadata).unwrap();
        assert_eq!(json, "\"preservation_metadata\"");
    }
}
