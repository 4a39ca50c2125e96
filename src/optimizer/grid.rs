//! Exhaustive parameter grid definition and expansion

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{RentError, Result};

/// A single candidate value for a hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            // whole floats keep their decimal point so "1.0" stays distinguishable from 1
            ParameterValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<usize> for ParameterValue {
    fn from(v: usize) -> Self {
        ParameterValue::Int(v as i64)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

/// One concrete assignment of a value to every grid key, in grid key order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParamSet {
    entries: Vec<(String, ParameterValue)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, preserving insertion order
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// String form used for tracker params and model metadata
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// Expand an ordered name → candidates mapping into its Cartesian product.
///
/// Sets are produced in lexicographic product order over the key order: the
/// last key varies fastest. Any empty candidate list yields no sets at all.
pub fn expand_grid(candidates: &[(String, Vec<ParameterValue>)]) -> Vec<ParamSet> {
    if let Some((name, _)) = candidates.iter().find(|(_, values)| values.is_empty()) {
        tracing::warn!(parameter = %name, "empty candidate list; grid expands to nothing");
        return Vec::new();
    }

    let total: usize = candidates.iter().map(|(_, values)| values.len()).product();
    let mut sets = Vec::with_capacity(total);
    let mut cursor = vec![0usize; candidates.len()];

    loop {
        let set = ParamSet {
            entries: candidates
                .iter()
                .zip(&cursor)
                .map(|((name, values), &i)| (name.clone(), values[i].clone()))
                .collect(),
        };
        sets.push(set);

        // odometer increment, rightmost key first
        let mut pos = candidates.len();
        loop {
            if pos == 0 {
                return sets;
            }
            pos -= 1;
            cursor[pos] += 1;
            if cursor[pos] < candidates[pos].1.len() {
                break;
            }
            cursor[pos] = 0;
        }
    }
}

/// Typed candidate grid for the gradient boosting regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
    /// Fraction of features considered at each split
    pub max_features: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            learning_rate: vec![0.01],
            max_depth: vec![3],
            max_features: vec![1.0],
        }
    }
}

impl ParamGrid {
    pub fn new(learning_rate: Vec<f64>, max_depth: Vec<usize>, max_features: Vec<f64>) -> Self {
        Self { learning_rate, max_depth, max_features }
    }

    /// Generic, ordered form of the grid
    pub fn candidates(&self) -> Vec<(String, Vec<ParameterValue>)> {
        vec![
            (
                "learning_rate".to_string(),
                self.learning_rate.iter().map(|&v| ParameterValue::Float(v)).collect(),
            ),
            (
                "max_depth".to_string(),
                self.max_depth.iter().map(|&v| ParameterValue::from(v)).collect(),
            ),
            (
                "max_features".to_string(),
                self.max_features.iter().map(|&v| ParameterValue::Float(v)).collect(),
            ),
        ]
    }

    /// Every parameter set of the grid
    pub fn expand(&self) -> Vec<ParamSet> {
        expand_grid(&self.candidates())
    }

    /// Number of sets the grid expands to
    pub fn size(&self) -> usize {
        self.learning_rate.len() * self.max_depth.len() * self.max_features.len()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, values) in self.candidates() {
            if values.is_empty() {
                return Err(RentError::EmptyGrid(name));
            }
        }
        if let Some(lr) = self.learning_rate.iter().find(|&&lr| !(lr > 0.0)) {
            return Err(RentError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: lr.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.max_depth.contains(&0) {
            return Err(RentError::InvalidParameter {
                name: "max_depth".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(mf) = self.max_features.iter().find(|&&mf| !(mf > 0.0 && mf <= 1.0)) {
            return Err(RentError::InvalidParameter {
                name: "max_features".to_string(),
                value: mf.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(entries: Vec<(&str, Vec<ParameterValue>)>) -> Vec<(String, Vec<ParameterValue>)> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_expand_two_keys() {
        let candidates = grid(vec![
            ("a", vec![1i64.into(), 2i64.into()]),
            ("b", vec![3i64.into()]),
        ]);
        let sets = expand_grid(&candidates);

        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0], ParamSet::new().with("a", 1i64).with("b", 3i64));
        assert_eq!(sets[1], ParamSet::new().with("a", 2i64).with("b", 3i64));
    }

    #[test]
    fn test_last_key_varies_fastest() {
        let candidates = grid(vec![
            ("a", vec![1i64.into(), 2i64.into()]),
            ("b", vec![3i64.into(), 4i64.into()]),
        ]);
        let pairs: Vec<(i64, i64)> = expand_grid(&candidates)
            .iter()
            .map(|s| (s.get("a").unwrap().as_int().unwrap(), s.get("b").unwrap().as_int().unwrap()))
            .collect();
        assert_eq!(pairs, vec![(1, 3), (1, 4), (2, 3), (2, 4)]);
    }

    #[test]
    fn test_empty_candidate_list_yields_nothing() {
        let candidates = grid(vec![("a", vec![1i64.into()]), ("b", vec![])]);
        assert!(expand_grid(&candidates).is_empty());
    }

    #[test]
    fn test_no_keys_yields_single_empty_set() {
        let sets = expand_grid(&[]);
        assert_eq!(sets.len(), 1);
        assert!(sets[0].is_empty());
    }

    #[test]
    fn test_typed_grid_size_matches_expansion() {
        let grid = ParamGrid::new(vec![0.01, 0.1], vec![3, 5, 7], vec![1.0]);
        let sets = grid.expand();
        assert_eq!(sets.len(), grid.size());
        assert_eq!(sets.len(), 6);
        assert_eq!(sets[0].keys().collect::<Vec<_>>(), vec!["learning_rate", "max_depth", "max_features"]);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(ParameterValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ParameterValue::Float(0.01).to_string(), "0.01");
        assert_eq!(ParameterValue::Int(3).to_string(), "3");
        let set = ParamSet::new().with("max_depth", 3usize).with("max_features", 1.0);
        assert_eq!(set.to_string(), "{max_depth: 3, max_features: 1.0}");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let empty = ParamGrid::new(vec![], vec![3], vec![1.0]);
        assert!(matches!(empty.validate(), Err(RentError::EmptyGrid(name)) if name == "learning_rate"));

        let bad_fraction = ParamGrid::new(vec![0.1], vec![3], vec![1.5]);
        assert!(matches!(bad_fraction.validate(), Err(RentError::InvalidParameter { .. })));

        assert!(ParamGrid::default().validate().is_ok());
    }
}
