//! Filter - Name/values constraints for server-side list filtering
//!
//! A [`FilterSpec`] is built once from declared configuration and then
//! translated into whatever filter type the remote API expects.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::provider::{ProviderError, ProviderResult};
use crate::resource::Value;

/// Ordered set of filters keyed by name
///
/// Names are unique; adding an existing name appends its new values.
/// Values keep first-seen order and are de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    filters: IndexMap<String, IndexSet<String>>,
}

/// Wire representation of a single filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireFilter {
    pub name: String,
    pub values: Vec<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, merging with an existing one of the same name
    pub fn add<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    pub fn with_filter<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(name, values);
        self
    }

    /// Parse the declarative `filter` attribute
    ///
    /// Accepts a list of `{ name = "...", values = ["..."] }` maps, or a
    /// single such map.
    pub fn from_value(value: &Value) -> ProviderResult<Self> {
        let blocks: Vec<&Value> = match value {
            Value::List(items) => items.iter().collect(),
            Value::Map(_) => vec![value],
            _ => {
                return Err(ProviderError::configuration(
                    "filter must be a list of { name, values } blocks",
                ));
            }
        };

        let mut spec = Self::new();
        for (index, block) in blocks.into_iter().enumerate() {
            let Value::Map(map) = block else {
                return Err(ProviderError::configuration(format!(
                    "filter[{}] must be a block with name and values",
                    index
                )));
            };

            let name = match map.get("name") {
                Some(Value::String(name)) if !name.is_empty() => name.clone(),
                Some(Value::String(_)) => {
                    return Err(ProviderError::configuration(format!(
                        "filter[{}].name must not be empty",
                        index
                    )));
                }
                Some(_) => {
                    return Err(ProviderError::configuration(format!(
                        "filter[{}].name must be a string",
                        index
                    )));
                }
                None => {
                    return Err(ProviderError::configuration(format!(
                        "filter[{}] is missing required attribute 'name'",
                        index
                    )));
                }
            };

            let values = match map.get("values") {
                Some(Value::List(items)) => items
                    .iter()
                    .map(|v| {
                        v.as_str().map(str::to_string).ok_or_else(|| {
                            ProviderError::configuration(format!(
                                "filter[{}].values must contain only strings",
                                index
                            ))
                        })
                    })
                    .collect::<ProviderResult<Vec<_>>>()?,
                Some(Value::String(single)) => vec![single.clone()],
                Some(_) => {
                    return Err(ProviderError::configuration(format!(
                        "filter[{}].values must be a list of strings",
                        index
                    )));
                }
                None => {
                    return Err(ProviderError::configuration(format!(
                        "filter[{}] is missing required attribute 'values'",
                        index
                    )));
                }
            };

            if values.is_empty() {
                return Err(ProviderError::configuration(format!(
                    "filter '{}' must have at least one value",
                    name
                )));
            }

            spec.add(name, values);
        }

        Ok(spec)
    }

    /// Number of distinct filter names
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// An empty spec means "no filtering", not "match nothing"
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Translate into the remote API's filter type, one per distinct name
    pub fn to_wire<W>(&self, mut build: impl FnMut(&str, Vec<String>) -> W) -> Vec<W> {
        self.filters
            .iter()
            .map(|(name, values)| build(name, values.iter().cloned().collect()))
            .collect()
    }

    pub fn wire_filters(&self) -> Vec<WireFilter> {
        self.to_wire(|name, values| WireFilter {
            name: name.to_string(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn block(name: &str, values: &[&str]) -> Value {
        Value::Map(HashMap::from([
            ("name".to_string(), Value::String(name.to_string())),
            ("values".to_string(), Value::string_list(values.iter().copied())),
        ]))
    }

    #[test]
    fn one_wire_filter_per_distinct_name() {
        let spec = FilterSpec::new()
            .with_filter("name", ["b", "a", "c"])
            .with_filter("platform", ["Linux"]);

        assert_eq!(spec.len(), 2);
        assert_eq!(
            spec.wire_filters(),
            vec![
                WireFilter {
                    name: "name".to_string(),
                    values: vec!["b".to_string(), "a".to_string(), "c".to_string()],
                },
                WireFilter {
                    name: "platform".to_string(),
                    values: vec!["Linux".to_string()],
                },
            ]
        );
    }

    #[test]
    fn duplicate_names_are_merged() {
        let spec = FilterSpec::new()
            .with_filter("name", ["a", "b"])
            .with_filter("name", ["b", "c"]);

        let wire = spec.wire_filters();
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].values, vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_spec_means_no_filtering() {
        let spec = FilterSpec::from_value(&Value::List(vec![])).unwrap();
        assert!(spec.is_empty());
        assert!(spec.wire_filters().is_empty());
    }

    #[test]
    fn parses_declared_blocks() {
        let value = Value::List(vec![
            block("name", &["distribution-1", "distribution-2"]),
            block("owner", &["Self"]),
        ]);

        let spec = FilterSpec::from_value(&value).unwrap();
        let wire = spec.wire_filters();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].name, "name");
        assert_eq!(wire[0].values, vec!["distribution-1", "distribution-2"]);
        assert_eq!(wire[1].name, "owner");
    }

    #[test]
    fn single_block_accepted() {
        let spec = FilterSpec::from_value(&block("name", &["x"])).unwrap();
        assert_eq!(spec.len(), 1);
    }

    #[test]
    fn malformed_blocks_are_configuration_errors() {
        use crate::provider::ErrorKind;

        let cases = vec![
            Value::String("name=x".to_string()),
            Value::List(vec![Value::Int(1)]),
            Value::List(vec![block("", &["x"])]),
            Value::List(vec![block("name", &[])]),
            Value::List(vec![Value::Map(HashMap::from([(
                "values".to_string(),
                Value::string_list(["x"]),
            )]))]),
            Value::List(vec![Value::Map(HashMap::from([(
                "name".to_string(),
                Value::String("name".to_string()),
            )]))]),
            Value::List(vec![Value::Map(HashMap::from([
                ("name".to_string(), Value::String("name".to_string())),
                ("values".to_string(), Value::List(vec![Value::Int(3)])),
            ]))]),
        ];

        for case in cases {
            let err = FilterSpec::from_value(&case).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{:?}", case);
        }
    }

    #[test]
    fn wire_filter_serializes() {
        let spec = FilterSpec::new().with_filter("name", ["a"]);
        let json = serde_json::to_value(spec.wire_filters()).unwrap();
        assert_eq!(json, serde_json::json!([{"name": "name", "values": ["a"]}]));
    }
}
