// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Plugin parameter schema and value resolution.

use std::collections::BTreeMap;

use archivum_index::EntityType;
use serde::{Deserialize, Serialize};

use crate::error::PluginError;

/// Raw parameter values as supplied with a job.
pub type ParameterValues = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginParameterType {
    Boolean,
    String,
    Number,
    ObjectType,
    PluginId,
}

/// One entry of a plugin's parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginParameter {
    pub name: String,
    pub parameter_type: PluginParameterType,
    pub default_value: Option<String>,
    pub mandatory: bool,
    pub read_only: bool,
    pub description: String,
}

impl PluginParameter {
    pub fn new(
        name: impl Into<String>,
        parameter_type: PluginParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            default_value: None,
            mandatory: false,
            read_only: false,
            description: description.into(),
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    fn check(&self, value: &str) -> Result<(), PluginError> {
        let ok = match self.parameter_type {
            PluginParameterType::Boolean => parse_bool(value).is_some(),
            PluginParameterType::Number => value.trim().parse::<f64>().is_ok(),
            PluginParameterType::ObjectType => value.parse::<EntityType>().is_ok(),
            PluginParameterType::String | PluginParameterType::PluginId => true,
        };
        if ok {
            Ok(())
        } else {
            Err(PluginError::InvalidParameter(format!(
                "'{}' is not a valid {:?} for {}",
                value, self.parameter_type, self.name
            )))
        }
    }
}

/// Parameter values checked against a schema, with defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedParameters {
    values: BTreeMap<String, String>,
}

impl ResolvedParameters {
    /// Check `values` against `schema`.
    ///
    /// Unknown names, values of the wrong type, changes to read-only
    /// parameters and missing mandatory parameters are all rejected.
    pub fn resolve(
        schema: &[PluginParameter],
        values: &ParameterValues,
    ) -> Result<Self, PluginError> {
        if let Some(unknown) = values.keys().find(|k| !schema.iter().any(|p| &p.name == *k)) {
            return Err(PluginError::InvalidParameter(format!("unknown parameter '{unknown}'")));
        }

        let mut resolved = BTreeMap::new();
        for parameter in schema {
            let supplied = values.get(&parameter.name);
            if parameter.read_only {
                if let Some(value) = supplied {
                    if Some(value) != parameter.default_value.as_ref() {
                        return Err(PluginError::InvalidParameter(format!(
                            "'{}' is read-only",
                            parameter.name
                        )));
                    }
                }
            }
            match supplied.or(parameter.default_value.as_ref()) {
                Some(value) => {
                    parameter.check(value)?;
                    resolved.insert(parameter.name.clone(), value.clone());
                }
                None if parameter.mandatory => {
                    return Err(PluginError::InvalidParameter(format!(
                        "missing mandatory parameter '{}'",
                        parameter.name
                    )));
                }
                None => {}
            }
        }
        Ok(Self { values: resolved })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(parse_bool)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<PluginParameter> {
        vec![
            PluginParameter::new("clear_indexes", PluginParameterType::Boolean, "Clear first")
                .with_default("false"),
            PluginParameter::new("optimize_indexes", PluginParameterType::Boolean, "Optimize after"),
            PluginParameter::new("format", PluginParameterType::String, "Output format")
                .with_default("png")
                .mandatory(),
            PluginParameter::new("kind", PluginParameterType::ObjectType, "Target").with_default("aip").read_only(),
        ]
    }

    fn values(pairs: &[(&str, &str)]) -> ParameterValues {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults_apply() {
        let resolved = ResolvedParameters::resolve(&schema(), &values(&[])).unwrap();
        assert_eq!(resolved.get_bool("clear_indexes"), Some(false));
        assert_eq!(resolved.get_bool("optimize_indexes"), None);
        assert_eq!(resolved.get("format"), Some("png"));
    }

    #[test]
    fn test_supplied_values_override() {
        let resolved =
            ResolvedParameters::resolve(&schema(), &values(&[("clear_indexes", "TRUE")])).unwrap();
        assert_eq!(resolved.get_bool("clear_indexes"), Some(true));
    }

    #[test]
    fn test_rejections() {
        for bad in [
            values(&[("clear_indexes", "yes")]),
            values(&[("nope", "1")]),
            values(&[("kind", "representation")]),
        ] {
            assert!(ResolvedParameters::resolve(&schema(), &bad).is_err(), "{bad:?}");
        }
        // Re-stating a read-only default is fine.
        assert!(ResolvedParameters::resolve(&schema(), &values(&[("kind", "aip")])).is_ok());
    }

    #[test]
    fn test_missing_mandatory() {
        let schema = vec![PluginParameter::new("command", PluginParameterType::String, "").mandatory()];
        let err = ResolvedParameters::resolve(&schema, &values(&[])).unwrap_err();
        assert!(err.to_string().contains("missing mandatory parameter 'command'"));
    }

    #[test]
    fn test_number() {
        let schema = vec![PluginParameter::new("n", PluginParameterType::Number, "")];
        let resolved = ResolvedParameters::resolve(&schema, &values(&[("n", "2.5")])).unwrap();
        assert_eq!(resolved.get_number("n"), Some(2.5));
        assert!(ResolvedParameters::resolve(&schema, &values(&[("n", "two")])).is_err());
    }
}
