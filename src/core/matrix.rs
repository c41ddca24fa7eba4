//! Matrix expansion
//!
//! Expands declared matrix axes into one immutable [`RunConfiguration`] per
//! combination. Expansion order is the lexicographic product of the axis
//! value lists: the first declared axis varies slowest. The order is stable
//! across calls, so run indices can be used for numbering and logging.

use crate::core::{config::scalar_to_string, ConfigError};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fmt;

/// A named dimension with an ordered list of values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixAxis {
    pub name: String,
    pub values: Vec<String>,
}

impl MatrixAxis {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// One partial or complete assignment of axis values
pub type Assignment = Vec<(String, String)>;

/// Declared matrix: axes plus optional include / exclude entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSpec {
    pub axes: Vec<MatrixAxis>,
    pub include: Vec<Assignment>,
    pub exclude: Vec<Assignment>,
}

impl MatrixSpec {
    pub fn new(axes: Vec<MatrixAxis>) -> Self {
        Self {
            axes,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Parse the `strategy.matrix` mapping, preserving axis declaration order
    pub fn from_yaml(mapping: &Mapping) -> Result<Self, ConfigError> {
        let mut spec = MatrixSpec::default();

        for (key, value) in mapping {
            let name = key
                .as_str()
                .ok_or(ConfigError::InvalidMatrixEntry { kind: "axis" })?;

            match name {
                "include" => spec.include = parse_entries(value, "include")?,
                "exclude" => spec.exclude = parse_entries(value, "exclude")?,
                _ => {
                    let values = match value {
                        Value::Sequence(seq) => seq
                            .iter()
                            .map(|v| {
                                scalar_to_string(v).ok_or_else(|| ConfigError::InvalidMatrixValue {
                                    axis: name.to_string(),
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()?,
                        Value::Null => Vec::new(),
                        other => vec![scalar_to_string(other).ok_or_else(|| {
                            ConfigError::InvalidMatrixValue {
                                axis: name.to_string(),
                            }
                        })?],
                    };
                    spec.axes.push(MatrixAxis::new(name, values));
                }
            }
        }

        Ok(spec)
    }

    /// Every variable name a run configuration may carry
    pub fn variable_names(&self) -> HashSet<&str> {
        self.axes
            .iter()
            .map(|axis| axis.name.as_str())
            .chain(self.include.iter().flatten().map(|(k, _)| k.as_str()))
            .collect()
    }
}

fn parse_entries(value: &Value, kind: &'static str) -> Result<Vec<Assignment>, ConfigError> {
    let Value::Sequence(entries) = value else {
        return Err(ConfigError::InvalidMatrixEntry { kind });
    };

    entries
        .iter()
        .map(|entry| {
            let Value::Mapping(map) = entry else {
                return Err(ConfigError::InvalidMatrixEntry { kind });
            };
            map.iter()
                .map(|(k, v)| match (k.as_str(), scalar_to_string(v)) {
                    (Some(k), Some(v)) => Ok((k.to_string(), v)),
                    _ => Err(ConfigError::InvalidMatrixEntry { kind }),
                })
                .collect()
        })
        .collect()
}

/// One concrete assignment of a value to every matrix axis.
///
/// Created by [`MatrixExpander`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    index: usize,
    values: Assignment,
}

impl RunConfiguration {
    pub fn new(index: usize, values: Assignment) -> Self {
        Self { index, values }
    }

    /// Position in expansion order (0-based)
    pub fn index(&self) -> usize {
        self.index
    }

    /// Axis values in declaration order
    pub fn values(&self) -> &[(String, String)] {
        &self.values
    }

    pub fn get(&self, axis: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, value)| value.as_str())
    }

    /// Human-readable label, e.g. `python-version=3.8, os=linux`
    pub fn label(&self) -> String {
        if self.values.is_empty() {
            "default".to_string()
        } else {
            self.values
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

impl fmt::Display for RunConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.index + 1, self.label())
    }
}

/// Expands a matrix into run configurations
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand the cartesian product of the axes, then apply exclude and include.
    ///
    /// Zero axes yield exactly one configuration (the empty assignment).
    pub fn expand(spec: &MatrixSpec) -> Result<Vec<RunConfiguration>, ConfigError> {
        let axis_names: HashSet<&str> = spec.axes.iter().map(|a| a.name.as_str()).collect();
        if spec
            .exclude
            .iter()
            .flatten()
            .any(|(key, _)| !axis_names.contains(key.as_str()))
        {
            return Err(ConfigError::InvalidMatrixEntry { kind: "exclude" });
        }

        let product = Self::product(&spec.axes)?;

        let mut combinations: Vec<Assignment> = product
            .into_iter()
            .filter(|combo| !spec.exclude.iter().any(|ex| Self::matches_entry(combo, ex)))
            .collect();

        if !spec.axes.is_empty() && combinations.is_empty() && spec.include.is_empty() {
            return Err(ConfigError::EmptyMatrix);
        }

        // A matrix made only of include entries has no implicit empty run
        if spec.axes.is_empty() && !spec.include.is_empty() {
            combinations.clear();
        }

        let product_len = combinations.len();

        for entry in &spec.include {
            let mut extended = false;

            for combo in combinations.iter_mut().take(product_len) {
                let compatible = entry.iter().all(|(k, v)| {
                    !axis_names.contains(k.as_str())
                        || combo.iter().any(|(ck, cv)| ck == k && cv == v)
                });
                if compatible {
                    for (k, v) in entry {
                        Self::assign(combo, k, v);
                    }
                    extended = true;
                }
            }

            if !extended {
                combinations.push(entry.clone());
            }
        }

        Ok(combinations
            .into_iter()
            .enumerate()
            .map(|(index, values)| RunConfiguration::new(index, values))
            .collect())
    }

    /// Cartesian product, first axis slowest
    fn product(axes: &[MatrixAxis]) -> Result<Vec<Assignment>, ConfigError> {
        let mut combinations: Vec<Assignment> = vec![Vec::new()];

        for axis in axes {
            if axis.values.is_empty() {
                return Err(ConfigError::EmptyAxis(axis.name.clone()));
            }

            combinations = combinations
                .into_iter()
                .flat_map(|combo| {
                    axis.values.iter().map(move |value| {
                        let mut next = combo.clone();
                        next.push((axis.name.clone(), value.clone()));
                        next
                    })
                })
                .collect();
        }

        Ok(combinations)
    }

    fn matches_entry(combo: &[(String, String)], entry: &[(String, String)]) -> bool {
        entry
            .iter()
            .all(|(k, v)| combo.iter().any(|(ck, cv)| ck == k && cv == v))
    }

    fn assign(combo: &mut Assignment, key: &str, value: &str) {
        match combo.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => combo.push((key.to_string(), value.to_string())),
        }
    }
}
