//! Parameter space: grid enumeration and seeded random sampling.
//!
//! Grid output is the cartesian product in declaration order, so candidate
//! `i` is the same parameter set on every run with the same spec.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ictlab_core::domain::{names, ParameterSet};
use ictlab_core::rng::RngHierarchy;

/// RNG stream used for random search draws.
pub const RANDOM_SEARCH_STREAM: &str = "random_search";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpaceError {
    #[error("parameter space is empty")]
    Empty,

    #[error("parameter {name}: steps must be at least 1")]
    ZeroSteps { name: String },

    #[error("parameter {name}: min {min} is greater than max {max}")]
    InvertedRange { name: String, min: f64, max: f64 },

    #[error("parameter {name}: {steps} steps requested but min == max")]
    DegenerateRange { name: String, steps: usize },

    #[error("parameter {name}: {steps} steps requested but the integer range holds only {distinct} whole numbers")]
    TooFewIntegers {
        name: String,
        steps: usize,
        distinct: usize,
    },

    #[error("parameter {name}: value list is empty")]
    EmptyValues { name: String },

    #[error("parameter {name}: bounds and values must be finite")]
    NonFinite { name: String },

    #[error("parameter {name} declared more than once")]
    DuplicateName { name: String },

    #[error("random search needs at least one iteration")]
    ZeroIterations,
}

/// Values a single parameter may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamDomain {
    /// `steps` evenly spaced values from `min` to `max` inclusive.
    Range {
        min: f64,
        max: f64,
        steps: usize,
        /// Round to whole numbers (hours, minutes).
        #[serde(default)]
        integer: bool,
    },
    /// Explicit list, used as given.
    Values { values: Vec<f64> },
}

impl ParamDomain {
    pub fn range(min: f64, max: f64, steps: usize) -> Self {
        Self::Range {
            min,
            max,
            steps,
            integer: false,
        }
    }

    pub fn integer_range(min: f64, max: f64, steps: usize) -> Self {
        Self::Range {
            min,
            max,
            steps,
            integer: true,
        }
    }

    pub fn values(values: impl Into<Vec<f64>>) -> Self {
        Self::Values {
            values: values.into(),
        }
    }

    fn validate(&self, name: &str) -> Result<(), SpaceError> {
        let name = || name.to_string();
        match self {
            Self::Range {
                min,
                max,
                steps,
                integer,
            } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(SpaceError::NonFinite { name: name() });
                }
                if *steps == 0 {
                    return Err(SpaceError::ZeroSteps { name: name() });
                }
                if min > max {
                    return Err(SpaceError::InvertedRange {
                        name: name(),
                        min: *min,
                        max: *max,
                    });
                }
                if *steps > 1 && min == max {
                    return Err(SpaceError::DegenerateRange {
                        name: name(),
                        steps: *steps,
                    });
                }
                if *integer {
                    let distinct = self.grid_values().len();
                    if distinct < *steps {
                        return Err(SpaceError::TooFewIntegers {
                            name: name(),
                            steps: *steps,
                            distinct,
                        });
                    }
                }
            }
            Self::Values { values } => {
                if values.is_empty() {
                    return Err(SpaceError::EmptyValues { name: name() });
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(SpaceError::NonFinite { name: name() });
                }
            }
        }
        Ok(())
    }

    /// Grid values in ascending order (range) or list order (values).
    ///
    /// The last range value is `max` exactly, not an accumulated sum.
    pub fn grid_values(&self) -> Vec<f64> {
        match self {
            Self::Range {
                min,
                max,
                steps,
                integer,
            } => {
                let (min, max, steps) = (*min, *max, *steps);
                let mut out: Vec<f64> = match steps {
                    0 => Vec::new(),
                    1 => vec![min],
                    _ => {
                        let last = steps - 1;
                        (0..steps)
                            .map(|i| {
                                if i == last {
                                    max
                                } else {
                                    min + (max - min) * i as f64 / last as f64
                                }
                            })
                            .collect()
                    }
                };
                if *integer {
                    out.iter_mut().for_each(|v| *v = v.round());
                    out.dedup();
                }
                out
            }
            Self::Values { values } => values.clone(),
        }
    }

    /// One uniform draw from the domain.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Range {
                min, max, integer, ..
            } => {
                if *integer {
                    let lo = min.round() as i64;
                    let hi = (max.round() as i64).max(lo);
                    rng.gen_range(lo..=hi) as f64
                } else if min < max {
                    rng.gen_range(*min..=*max)
                } else {
                    *min
                }
            }
            Self::Values { values } => values[rng.gen_range(0..values.len())],
        }
    }

    /// Number of grid values.
    pub fn len(&self) -> usize {
        self.grid_values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(flatten)]
    pub domain: ParamDomain,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, domain: ParamDomain) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }
}

/// Ordered parameter declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSpec {
    pub params: Vec<ParamDef>,
}

impl ParamSpec {
    pub fn new(params: Vec<ParamDef>) -> Self {
        Self { params }
    }

    /// Reference space for Gap Guardian optimization.
    pub fn gap_guardian_default() -> Self {
        Self::new(vec![
            ParamDef::new(names::STOP_LOSS_POINTS, ParamDomain::range(5.0, 50.0, 5)),
            ParamDef::new(names::RRR, ParamDomain::range(1.0, 5.0, 5)),
            ParamDef::new(names::ENTRY_START_HOUR, ParamDomain::integer_range(8.0, 10.0, 3)),
            ParamDef::new(names::ENTRY_START_MINUTE, ParamDomain::values([0.0, 15.0, 30.0, 45.0])),
            ParamDef::new(names::ENTRY_END_HOUR, ParamDomain::integer_range(10.0, 12.0, 3)),
            ParamDef::new(names::ENTRY_END_MINUTE, ParamDomain::values([0.0])),
        ])
    }

    pub fn validate(&self) -> Result<(), SpaceError> {
        if self.params.is_empty() {
            return Err(SpaceError::Empty);
        }
        for (i, def) in self.params.iter().enumerate() {
            if self.params[..i].iter().any(|d| d.name == def.name) {
                return Err(SpaceError::DuplicateName {
                    name: def.name.clone(),
                });
            }
            def.domain.validate(&def.name)?;
        }
        Ok(())
    }

    /// Size of the full cartesian product.
    pub fn grid_size(&self) -> usize {
        self.params.iter().map(|d| d.domain.len()).product()
    }

    /// Every combination, first-declared parameter varying slowest.
    pub fn grid(&self) -> Result<Vec<ParameterSet>, SpaceError> {
        self.validate()?;
        let axes: Vec<(&str, Vec<f64>)> = self
            .params
            .iter()
            .map(|d| (d.name.as_str(), d.domain.grid_values()))
            .collect();
        Ok(cartesian(&axes)
            .into_iter()
            .map(|combo| combo.into_iter().collect())
            .collect())
    }

    /// `iterations` independent uniform draws. Duplicates are kept.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        iterations: usize,
        rng: &mut R,
    ) -> Result<Vec<ParameterSet>, SpaceError> {
        self.validate()?;
        if iterations == 0 {
            return Err(SpaceError::ZeroIterations);
        }
        Ok((0..iterations)
            .map(|_| {
                self.params
                    .iter()
                    .map(|d| (d.name.clone(), d.domain.sample(rng)))
                    .collect()
            })
            .collect())
    }
}

fn cartesian(axes: &[(&str, Vec<f64>)]) -> Vec<Vec<(String, f64)>> {
    let Some(((name, values), rest)) = axes.split_first() else {
        return vec![vec![]];
    };
    let sub = cartesian(rest);
    let mut out = Vec::with_capacity(values.len() * sub.len());
    for &value in values {
        for combo in &sub {
            let mut row = Vec::with_capacity(combo.len() + 1);
            row.push((name.to_string(), value));
            row.extend(combo.iter().cloned());
            out.push(row);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    #[default]
    GridSearch,
    RandomSearch,
}

/// Expand `spec` into candidates for `algorithm`.
///
/// Random search draws from the hierarchy's `"random_search"` stream, so the
/// same seed always yields the same candidates.
pub fn enumerate(
    spec: &ParamSpec,
    algorithm: SearchAlgorithm,
    iterations: usize,
    rng: &RngHierarchy,
) -> Result<Vec<ParameterSet>, SpaceError> {
    match algorithm {
        SearchAlgorithm::GridSearch => spec.grid(),
        SearchAlgorithm::RandomSearch => {
            let mut stream = rng.rng_for(RANDOM_SEARCH_STREAM, 0);
            spec.sample(iterations, &mut stream)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_includes_both_endpoints() {
        let values = ParamDomain::range(5.0, 50.0, 5).grid_values();
        assert_eq!(values, vec![5.0, 16.25, 27.5, 38.75, 50.0]);
    }

    #[test]
    fn single_step_is_min() {
        assert_eq!(ParamDomain::range(3.0, 3.0, 1).grid_values(), vec![3.0]);
    }

    #[test]
    fn integer_range_rounds() {
        assert_eq!(
            ParamDomain::integer_range(8.0, 10.0, 3).grid_values(),
            vec![8.0, 9.0, 10.0]
        );
    }

    #[test]
    fn integer_range_with_too_many_steps_rejected() {
        let spec = ParamSpec::new(vec![ParamDef::new(
            names::ENTRY_START_HOUR,
            ParamDomain::integer_range(8.0, 10.0, 5),
        )]);
        assert_eq!(
            spec.validate(),
            Err(SpaceError::TooFewIntegers {
                name: names::ENTRY_START_HOUR.to_string(),
                steps: 5,
                distinct: 3,
            })
        );
        assert!(spec.grid().is_err());
    }

    #[test]
    fn integer_range_keeps_every_step_when_spacing_allows() {
        let values = ParamDomain::integer_range(0.0, 12.0, 5).grid_values();
        assert_eq!(values, vec![0.0, 3.0, 6.0, 9.0, 12.0]);
        let spec = ParamSpec::new(vec![ParamDef::new("h", ParamDomain::integer_range(0.0, 12.0, 5))]);
        assert_eq!(spec.validate(), Ok(()));
    }

    #[test]
    fn values_kept_as_given() {
        assert_eq!(
            ParamDomain::values([30.0, 0.0, 15.0]).grid_values(),
            vec![30.0, 0.0, 15.0]
        );
    }

    #[test]
    fn grid_is_declaration_ordered_product() {
        let spec = ParamSpec::new(vec![
            ParamDef::new("a", ParamDomain::values([1.0, 2.0])),
            ParamDef::new("b", ParamDomain::values([10.0, 20.0, 30.0])),
        ]);
        let grid = spec.grid().unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(spec.grid_size(), 6);
        assert_eq!(grid[0].get("a"), Some(1.0));
        assert_eq!(grid[0].get("b"), Some(10.0));
        assert_eq!(grid[1].get("b"), Some(20.0));
        assert_eq!(grid[3].get("a"), Some(2.0));
        assert_eq!(grid[5].iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn default_space_size() {
        // 5 * 5 * 3 * 4 * 3 * 1
        assert_eq!(ParamSpec::gap_guardian_default().grid().unwrap().len(), 900);
    }

    #[test]
    fn validation_errors() {
        let one = |domain| ParamSpec::new(vec![ParamDef::new("p", domain)]);
        assert_eq!(ParamSpec::default().grid(), Err(SpaceError::Empty));
        assert!(matches!(
            one(ParamDomain::range(0.0, 1.0, 0)).validate(),
            Err(SpaceError::ZeroSteps { .. })
        ));
        assert!(matches!(
            one(ParamDomain::range(2.0, 1.0, 3)).validate(),
            Err(SpaceError::InvertedRange { .. })
        ));
        assert!(matches!(
            one(ParamDomain::range(1.0, 1.0, 3)).validate(),
            Err(SpaceError::DegenerateRange { .. })
        ));
        assert!(matches!(
            one(ParamDomain::values(Vec::new())).validate(),
            Err(SpaceError::EmptyValues { .. })
        ));
        assert!(matches!(
            one(ParamDomain::range(0.0, f64::INFINITY, 2)).validate(),
            Err(SpaceError::NonFinite { .. })
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let spec = ParamSpec::new(vec![
            ParamDef::new("p", ParamDomain::values([1.0])),
            ParamDef::new("p", ParamDomain::values([2.0])),
        ]);
        assert!(matches!(spec.validate(), Err(SpaceError::DuplicateName { .. })));
    }

    #[test]
    fn random_search_is_seeded() {
        let spec = ParamSpec::gap_guardian_default();
        let a = enumerate(&spec, SearchAlgorithm::RandomSearch, 25, &RngHierarchy::new(42)).unwrap();
        let b = enumerate(&spec, SearchAlgorithm::RandomSearch, 25, &RngHierarchy::new(42)).unwrap();
        let c = enumerate(&spec, SearchAlgorithm::RandomSearch, 25, &RngHierarchy::new(43)).unwrap();
        assert_eq!(a.len(), 25);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn random_draws_stay_in_domain() {
        let spec = ParamSpec::gap_guardian_default();
        let draws = enumerate(&spec, SearchAlgorithm::RandomSearch, 200, &RngHierarchy::new(1)).unwrap();
        for set in &draws {
            let sl = set.get(names::STOP_LOSS_POINTS).unwrap();
            assert!((5.0..=50.0).contains(&sl));
            let hour = set.get(names::ENTRY_START_HOUR).unwrap();
            assert_eq!(hour, hour.round());
            assert!([0.0, 15.0, 30.0, 45.0].contains(&set.get(names::ENTRY_START_MINUTE).unwrap()));
        }
    }

    #[test]
    fn zero_iterations_rejected() {
        let spec = ParamSpec::gap_guardian_default();
        assert_eq!(
            enumerate(&spec, SearchAlgorithm::RandomSearch, 0, &RngHierarchy::new(1)),
            Err(SpaceError::ZeroIterations)
        );
    }

    #[test]
    fn deserializes_both_domain_shapes() {
        let spec: ParamSpec = serde_json::from_str(
            r#"[{"name":"rrr","min":1,"max":5,"steps":5},{"name":"entry_end_minute","values":[0]}]"#,
        )
        .unwrap();
        assert_eq!(spec.params[0].domain, ParamDomain::range(1.0, 5.0, 5));
        assert_eq!(spec.params[1].domain, ParamDomain::values([0.0]));
    }
}
