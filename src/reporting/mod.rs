//! # Parameter reporting
//!
//! A registration sink for named parameter handles. Sampling code registers
//! live handles once at model-construction time; the surrounding MCMC loop
//! calls [`ParameterRegistry::record_draws`] once per retained iteration, and
//! downstream reporting reads the accumulated draw log. The registry never
//! participates in sampling itself.

use std::cell::RefCell;
use std::rc::Rc;

use num_traits::ToPrimitive;

/// A parameter that can be snapshotted for external reporting.
pub trait ReportedParameter {
    /// Current parameter values in a flat, stable order.
    fn snapshot(&self) -> Vec<f64>;
}

/// Shared handle to a live, reportable parameter.
pub type ParameterHandle = Rc<RefCell<dyn ReportedParameter>>;

struct RegistryEntry {
    name: String,
    handle: ParameterHandle,
    draws: Vec<Vec<f64>>,
}

/// Named parameter handles plus their recorded posterior draws.
#[derive(Default)]
pub struct ParameterRegistry {
    entries: Vec<RegistryEntry>,
}

impl ParameterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `name`, replacing any same-named entry and
    /// discarding its recorded draws.
    pub fn add(&mut self, name: &str, handle: ParameterHandle) {
        self.remove(name);
        self.entries.push(RegistryEntry {
            name: name.to_owned(),
            handle,
            draws: Vec::new(),
        });
    }

    /// Drop the entry registered under `name`. Returns whether one existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.name != name);
        self.entries.len() != before
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Snapshot every registered parameter once.
    pub fn record_draws(&mut self) {
        for entry in &mut self.entries {
            entry.draws.push(entry.handle.borrow().snapshot());
        }
    }

    /// Recorded draws for `name`, in recording order.
    #[must_use]
    pub fn draws(&self, name: &str) -> Option<&[Vec<f64>]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.draws.as_slice())
    }

    /// Per-component posterior summaries over the recorded draws for `name`.
    #[must_use]
    pub fn summarize(&self, name: &str) -> Option<Vec<ParameterSummary>> {
        let draws = self.draws(name)?;
        let width = draws.first().map_or(0, Vec::len);
        Some(
            (0..width)
                .map(|component| {
                    let values: Vec<f64> = draws.iter().map(|draw| draw[component]).collect();
                    summarize_scalar(&values)
                })
                .collect(),
        )
    }
}

/// Scalar posterior summary statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub q025: f64,
    pub q50: f64,
    pub q975: f64,
}

fn summarize_scalar(values: &[f64]) -> ParameterSummary {
    if values.is_empty() {
        return ParameterSummary::default();
    }

    let n = usize_to_f64(values.len());
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| {
            let centered = value - mean;
            centered * centered
        })
        .sum::<f64>()
        / n.max(1.0);

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    ParameterSummary {
        mean,
        std_dev: variance.sqrt(),
        q025: percentile(&sorted, 0.025),
        q50: percentile(&sorted, 0.5),
        q975: percentile(&sorted, 0.975),
    }
}

fn percentile(sorted_values: &[f64], probability: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }

    let clamped = probability.clamp(0.0, 1.0);
    let last = sorted_values.len() - 1;
    let position = clamped * usize_to_f64(last);
    let lower = position.floor().to_usize().unwrap_or(0);
    let upper = position.ceil().to_usize().unwrap_or(last);

    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = position - usize_to_f64(lower);
        (1.0 - weight).mul_add(sorted_values[lower], weight * sorted_values[upper])
    }
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FixedParameter(Vec<f64>);

    impl ReportedParameter for FixedParameter {
        fn snapshot(&self) -> Vec<f64> {
            self.0.clone()
        }
    }

    fn handle(values: Vec<f64>) -> ParameterHandle {
        Rc::new(RefCell::new(FixedParameter(values)))
    }

    #[test]
    fn add_replaces_same_name_and_clears_draws() {
        let mut registry = ParameterRegistry::new();
        registry.add("coefficients", handle(vec![1.0]));
        registry.record_draws();
        assert_eq!(registry.draws("coefficients").map(<[Vec<f64>]>::len), Some(1));

        registry.add("coefficients", handle(vec![2.0, 3.0]));
        assert_eq!(registry.draws("coefficients").map(<[Vec<f64>]>::len), Some(0));
        assert_eq!(registry.names(), vec!["coefficients"]);
    }

    #[test]
    fn record_draws_snapshots_live_values() {
        let shared = Rc::new(RefCell::new(FixedParameter(vec![0.0])));
        let mut registry = ParameterRegistry::new();
        registry.add("coefficients", shared.clone());

        registry.record_draws();
        shared.borrow_mut().0[0] = 5.0;
        registry.record_draws();

        let draws = registry.draws("coefficients").expect("registered");
        assert_eq!(draws.len(), 2);
        assert!((draws[0][0] - 0.0).abs() < f64::EPSILON);
        assert!((draws[1][0] - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summarize_reports_per_component_statistics() {
        let shared = Rc::new(RefCell::new(FixedParameter(vec![1.0, -1.0])));
        let mut registry = ParameterRegistry::new();
        registry.add("coefficients", shared.clone());
        registry.record_draws();
        shared.borrow_mut().0 = vec![3.0, -3.0];
        registry.record_draws();

        let summary = registry.summarize("coefficients").expect("registered");
        assert_eq!(summary.len(), 2);
        assert!((summary[0].mean - 2.0).abs() < 1.0e-12);
        assert!((summary[1].mean + 2.0).abs() < 1.0e-12);
    }

    #[test]
    fn remove_reports_whether_an_entry_existed() {
        let mut registry = ParameterRegistry::new();
        assert!(!registry.remove("coefficients"));
        registry.add("coefficients", handle(vec![1.0]));
        assert!(registry.remove("coefficients"));
        assert!(!registry.contains("coefficients"));
    }
}
