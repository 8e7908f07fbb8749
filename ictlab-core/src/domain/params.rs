//! ParameterSet: one immutable backtest configuration.
//!
//! Keys keep declaration order so that candidate tables read the same way the
//! parameter space was written. The fingerprint hashes the ordered name/value
//! pairs, so two sets with identical names and values in the same order
//! always share an id.

use serde::{Deserialize, Serialize};

/// Well-known parameter names understood by the simulator and strategies.
pub mod names {
    pub const STOP_LOSS_POINTS: &str = "stop_loss_points";
    pub const RRR: &str = "rrr";
    pub const ENTRY_START_HOUR: &str = "entry_start_hour";
    pub const ENTRY_START_MINUTE: &str = "entry_start_minute";
    pub const ENTRY_END_HOUR: &str = "entry_end_hour";
    pub const ENTRY_END_MINUTE: &str = "entry_end_minute";
}

/// Ordered mapping from parameter name to scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: Vec<(String, f64)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. A repeated name replaces the earlier value in place.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        let name = name.into();
        match self.values.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deterministic content hash (first 16 hex chars of BLAKE3).
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in &self.values {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            hasher.update(&value.to_bits().to_le_bytes());
        }
        let hex = hasher.finalize().to_hex();
        hex.as_str()[..16].to_string()
    }

    /// Compact `name=value` rendering for logs and tables.
    pub fn label(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |set, (name, value)| set.with(name, value))
    }
}
